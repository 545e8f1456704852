//! SMA response frame parsing
//!
//! Weight is reported as one fixed-width line:
//!
//! ```text
//! ┌──────────────┬──────┬────────────────┬───┬───────────┬─────────┐
//! │   Id code    │ Sign │   Magnitude    │ _ │   Units   │  CR LF  │
//! │   6 bytes    │      │    9 bytes     │   │  3 bytes  │ 2 bytes │
//! └──────────────┴──────┴────────────────┴───┴───────────┴─────────┘
//! ```
//!
//! Faults share the envelope, with `Stat` as id and an error text where the
//! magnitude would be. The most common one is `OFF`: the scale is powered but
//! the face plate is off.
//!
//! The units field is blank while the weight is still shifting. [`UnitsCache`]
//! carries the last stable units over those frames.

use smascale_types::{Measurement, Reading, Weight};

use crate::constants::frame;
use crate::error::{Error, Result};

/// Unit symbols an SMA scale may report
pub const KNOWN_UNITS: &[&str] = &["g", "kg", "mg", "ct", "lb", "oz", "ozt", "dwt", "t"];

/// A decoded weight response line
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    /// Wrong width or not ASCII
    Malformed,

    /// Device status frame with its error text
    Fault(String),

    /// Weight frame; `units` is `None` while the weight is unstable
    Weight {
        mass: f64,
        units: Option<String>,
        measurement: Measurement,
    },
}

impl Frame {
    /// Parse one raw line, terminator included
    ///
    /// A line of the wrong width is [`Frame::Malformed`], never an error.
    ///
    /// # Errors
    ///
    /// - [`Error::UnsupportedMode`] if the id code is not `N`, `G` or `Stat`
    /// - [`Error::InvalidMass`] if the magnitude is not a number
    ///
    /// # Examples
    ///
    /// ```
    /// use smascale_core::Frame;
    /// use smascale_types::Measurement;
    ///
    /// let frame = Frame::parse("N     +   0.1234 g  \r\n").unwrap();
    /// assert_eq!(
    ///     frame,
    ///     Frame::Weight {
    ///         mass: 0.1234,
    ///         units: Some("g".into()),
    ///         measurement: Measurement::Net,
    ///     }
    /// );
    /// ```
    pub fn parse(line: &str) -> Result<Self> {
        if line.len() != frame::LEN || !line.is_ascii() {
            return Ok(Self::Malformed);
        }

        let id = line[frame::ID].trim();
        if id == frame::STATUS_ID {
            return Ok(Self::Fault(line[frame::FAULT].trim().to_string()));
        }

        let measurement = Measurement::from_id_code(id)
            .map_err(|_| Error::UnsupportedMode(id.to_string()))?;

        let raw_mass = &line[frame::MASS];
        let mass = raw_mass
            .replace(' ', "")
            .parse::<f64>()
            .map_err(|_| Error::InvalidMass(raw_mass.to_string()))?;

        let units = line[frame::UNITS].trim();

        Ok(Self::Weight {
            mass,
            units: (!units.is_empty()).then(|| units.to_string()),
            measurement,
        })
    }

    /// Convert to a [`Reading`], consulting and updating `cache`
    pub fn into_reading(self, cache: &mut UnitsCache) -> Reading {
        match self {
            Self::Malformed | Self::Fault(_) => Reading::Off,
            Self::Weight {
                mass,
                units,
                measurement,
            } => {
                let stable = units.is_some();
                let units = match units {
                    Some(units) => {
                        cache.set(&units);
                        units
                    }
                    None => cache.get().unwrap_or_default().to_string(),
                };

                Reading::Weight(Weight {
                    mass,
                    units,
                    stable,
                    measurement,
                })
            }
        }
    }
}

/// Last units reported by a stable reading
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnitsCache(Option<String>);

impl UnitsCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> Option<&str> {
        self.0.as_deref()
    }

    fn set(&mut self, units: &str) {
        if self.0.as_deref() != Some(units) {
            self.0 = Some(units.to_string());
        }
    }
}

/// Check whether `text` carries pieces of a weight frame
///
/// Info responses are free text, so a misaligned read can hand back a
/// fragment of a weight line instead. Such a fragment has a sign followed by
/// padding, starts with a measurement id and a signed mass, has a `Stat` id,
/// or ends in a number and a unit symbol.
pub fn looks_like_weight(text: &str) -> bool {
    let text = text.trim();

    if text.contains("+ ") || text.contains("- ") {
        return true;
    }

    // Unstable frames carry no units, so a full-width mass ends the text
    if let Some((id, rest)) = text.split_once(' ') {
        let mass = rest.trim_start();
        if Measurement::from_id_code(id).is_ok()
            && mass.starts_with(['+', '-'])
            && mass.replace(' ', "").parse::<f64>().is_ok()
        {
            return true;
        }
    }

    if text
        .strip_prefix(frame::STATUS_ID)
        .is_some_and(|rest| rest.starts_with(' '))
    {
        return true;
    }

    let mut tokens = text.split_whitespace().rev();
    match (tokens.next(), tokens.next()) {
        (Some(unit), Some(number)) => {
            KNOWN_UNITS.contains(&unit) && number.parse::<f64>().is_ok()
        }
        _ => false,
    }
}
