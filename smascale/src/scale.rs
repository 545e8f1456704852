//! High-level scale interface

use parking_lot::Mutex;
use tracing::{debug, error, trace, warn};

use smascale_core::{Command, Frame, UnitsCache, looks_like_weight};
use smascale_transport::{SerialTransport, TcpTransport, Transport};
use smascale_types::{DeviceInfo, Reading};

use crate::error::{Error, Result};

/// SMA weighing scale
///
/// High-level interface for reading weights from Sartorius, Minebea Intec and
/// other scales implementing the SMA protocol.
///
/// All methods take `&self`; a scale can be shared between tasks behind an
/// `Arc`. Commands are sent one at a time in call order.
///
/// # Examples
///
/// ```no_run
/// use smascale::{Reading, Scale};
///
/// #[tokio::main]
/// async fn main() -> smascale::Result<()> {
///     let scale = Scale::tcp("192.168.1.50:49155")?;
///
///     match scale.get().await? {
///         Reading::Weight(w) => println!("{} {}", w.mass, w.units),
///         Reading::Off => println!("scale is off"),
///     }
///
///     scale.close().await;
///     Ok(())
/// }
/// ```
pub struct Scale {
    transport: Box<dyn Transport>,
    units: Mutex<UnitsCache>,
}

impl Scale {
    /// Create a scale on top of any transport
    pub fn new(transport: impl Transport + 'static) -> Self {
        Self {
            transport: Box::new(transport),
            units: Mutex::new(UnitsCache::new()),
        }
    }

    /// Create a scale reachable over TCP at `host:port`
    ///
    /// Nothing is connected until [`open`](Self::open) or the first command.
    pub fn tcp(address: &str) -> Result<Self> {
        Ok(Self::new(TcpTransport::new(address)?))
    }

    /// Create a scale on a serial device, opening it immediately
    pub fn serial(path: &str) -> Result<Self> {
        Ok(Self::new(SerialTransport::new(path)?))
    }

    /// Connect now instead of on the first command
    pub async fn open(&self) -> Result<()> {
        self.transport.open().await?;
        debug!("Scale at {} ready", self.transport.remote_addr());
        Ok(())
    }

    /// Close the connection
    pub async fn close(&self) {
        self.transport.close().await
    }

    pub fn remote_addr(&self) -> String {
        self.transport.remote_addr()
    }

    /// Units of the last stable reading
    pub fn cached_units(&self) -> Option<String> {
        self.units.lock().get().map(str::to_string)
    }

    /// Get scale reading
    ///
    /// Returns [`Reading::Off`] when the scale cannot be reached, answers
    /// with a malformed frame, or reports a fault (commonly the face plate
    /// being off).
    ///
    /// # Errors
    ///
    /// Fails if the frame reports a measurement mode other than net or gross,
    /// or an unreadable mass.
    pub async fn get(&self) -> Result<Reading> {
        let line = self.transport.exchange(Command::ReadWeight).await;
        self.decode(line.as_deref())
    }

    /// Get scale model, serial number and software version
    ///
    /// Returns `Ok(None)` if any answer looks like part of a weight frame,
    /// which happens when a late reply shifts the responses.
    pub async fn get_info(&self) -> Result<Option<DeviceInfo>> {
        // Firmware answers in request order, so query one at a time
        let mut answers = Vec::with_capacity(Command::INFO_QUERIES.len());
        for command in Command::INFO_QUERIES {
            let answer = self
                .transport
                .exchange(command)
                .await
                .ok_or(Error::NoResponse(command))?;
            answers.push(answer);
        }

        let info = DeviceInfo::new(&answers[0], &answers[1], &answers[2]);

        if let Some((name, value)) = info
            .fields()
            .into_iter()
            .find(|(_, value)| looks_like_weight(value))
        {
            warn!("Discarding scale info, {} looks like a weight: {:?}", name, value);
            return Ok(None);
        }

        Ok(Some(info))
    }

    /// Tare and zero the scale
    pub async fn zero(&self) -> Result<()> {
        self.transport
            .exchange(Command::Tare)
            .await
            .ok_or(Error::NoResponse(Command::Tare))?;
        Ok(())
    }

    fn decode(&self, line: Option<&str>) -> Result<Reading> {
        let Some(line) = line else {
            return Ok(Reading::Off);
        };

        let frame = Frame::parse(line)?;
        match &frame {
            Frame::Malformed => error!("Received malformed data: {:?}", line),
            Frame::Fault(text) => warn!("Could not read: {}", text),
            Frame::Weight { .. } => trace!("Decoded {:?}", frame),
        }

        Ok(frame.into_reading(&mut self.units.lock()))
    }
}

impl std::fmt::Debug for Scale {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scale")
            .field("remote_addr", &self.transport.remote_addr())
            .field("units", &self.cached_units())
            .finish()
    }
}
