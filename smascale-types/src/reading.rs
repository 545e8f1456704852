//! Weight readings

use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Measurement mode, selected by the frame's id code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Measurement {
    /// Net weight (id code `N`)
    Net,

    /// Gross weight (id code `G`)
    Gross,
}

impl Measurement {
    /// Map a trimmed id code to a measurement mode
    pub fn from_id_code(code: &str) -> Result<Self> {
        match code {
            "N" => Ok(Self::Net),
            "G" => Ok(Self::Gross),
            other => Err(Error::UnknownMeasurement(other.to_string())),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Net => "net",
            Self::Gross => "gross",
        }
    }
}

impl FromStr for Measurement {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "net" | "n" => Ok(Self::Net),
            "gross" | "g" => Ok(Self::Gross),
            _ => Err(Error::Parse(format!("not a measurement mode: {s}"))),
        }
    }
}

impl fmt::Display for Measurement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A decoded weight
#[derive(Debug, Clone, PartialEq)]
pub struct Weight {
    /// Signed mass in `units`
    pub mass: f64,

    /// Unit symbol, e.g. `g` or `kg`
    ///
    /// Unstable frames carry no units; the last stable units are substituted.
    pub units: String,

    /// `true` when the scale reported units, i.e. the weight has settled
    pub stable: bool,

    /// Net or gross
    pub measurement: Measurement,
}

/// Result of a weight request
#[derive(Debug, Clone, PartialEq)]
pub enum Reading {
    /// Scale unreachable, unready, or reporting a fault
    Off,

    /// A weight reading
    Weight(Weight),
}

impl Reading {
    /// `false` when the scale did not produce a weight
    pub fn is_on(&self) -> bool {
        matches!(self, Self::Weight(_))
    }

    pub fn weight(&self) -> Option<&Weight> {
        match self {
            Self::Weight(w) => Some(w),
            Self::Off => None,
        }
    }
}

impl fmt::Display for Reading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Off => write!(f, "off"),
            Self::Weight(w) => write!(
                f,
                "{} {} ({}, {})",
                w.mass,
                w.units,
                w.measurement,
                if w.stable { "stable" } else { "unstable" }
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_measurement_from_id_code() {
        assert_eq!(Measurement::from_id_code("N").unwrap(), Measurement::Net);
        assert_eq!(Measurement::from_id_code("G").unwrap(), Measurement::Gross);
        assert!(Measurement::from_id_code("T").is_err());
        assert!(Measurement::from_id_code("n").is_err());
    }

    #[test]
    fn test_measurement_from_str() {
        assert_eq!("net".parse::<Measurement>().unwrap(), Measurement::Net);
        assert_eq!("GROSS".parse::<Measurement>().unwrap(), Measurement::Gross);
        assert!("tare".parse::<Measurement>().is_err());
    }

    #[test]
    fn test_reading_accessors() {
        let reading = Reading::Weight(Weight {
            mass: 0.1234,
            units: "g".into(),
            stable: true,
            measurement: Measurement::Net,
        });

        assert!(reading.is_on());
        assert_eq!(reading.weight().map(|w| w.units.as_str()), Some("g"));
        assert_eq!(reading.to_string(), "0.1234 g (net, stable)");

        assert!(!Reading::Off.is_on());
        assert_eq!(Reading::Off.weight(), None);
    }
}
