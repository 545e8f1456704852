//! Serial transport
//!
//! Scales on RS-232 use 9600 baud, 8 data bits, odd parity and one stop bit.
//! The port is opened once; a serial line does not drop the way a socket
//! does, so there is nothing to reconnect. Repeated failures flush the input
//! instead.

use std::time::Duration;

use async_trait::async_trait;
use bytes::BytesMut;
use tokio::io::AsyncWriteExt;
use tokio_serial::{ClearBuffer, DataBits, Parity, SerialStream, StopBits};
use tracing::{debug, trace};

use smascale_core::Command;
use smascale_core::constants::serial::{BAUD_RATE, BYTE_TIMEOUT};

use crate::connection::{Connection, ConnectionState};
use crate::line::{drain_lines, read_line};
use crate::{Link, Transport, error::*};

/// Link over a local serial device
pub struct SerialLink {
    path: String,
    port: Option<SerialStream>,
    read_buf: BytesMut,
}

impl SerialLink {
    /// Open `path` at 9600-8-O-1
    ///
    /// Must be called from within a Tokio runtime.
    pub fn open(path: &str) -> Result<Self> {
        let builder = tokio_serial::new(path, BAUD_RATE)
            .data_bits(DataBits::Eight)
            .parity(Parity::Odd)
            .stop_bits(StopBits::One)
            .timeout(BYTE_TIMEOUT);

        let port = SerialStream::open(&builder)?;

        debug!("Opened {} at {} baud, 8-O-1", path, BAUD_RATE);

        Ok(Self::from_stream(path, port))
    }

    /// Wrap a port that is already open and configured
    pub fn from_stream(path: &str, port: SerialStream) -> Self {
        Self {
            path: path.to_string(),
            port: Some(port),
            read_buf: BytesMut::with_capacity(64),
        }
    }
}

#[async_trait]
impl Link for SerialLink {
    async fn connect(&mut self) -> Result<()> {
        // Opened at construction; once closed it stays closed
        if self.port.is_some() {
            Ok(())
        } else {
            Err(Error::NotConnected)
        }
    }

    async fn disconnect(&mut self) -> Result<()> {
        if self.port.take().is_some() {
            debug!("Closing {}", self.path);
        }
        self.read_buf.clear();
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.port.is_some()
    }

    async fn send(&mut self, data: &[u8]) -> Result<()> {
        let port = self.port.as_mut().ok_or(Error::NotConnected)?;

        trace!("Sending {} bytes: {}", data.len(), hex::encode(data));

        port.write_all(data).await?;
        port.flush().await?;

        Ok(())
    }

    async fn receive_line(&mut self) -> Result<BytesMut> {
        let port = self.port.as_mut().ok_or(Error::NotConnected)?;

        // Untrimmed: the frame width includes the terminator
        let line = read_line(port, &mut self.read_buf).await?;

        trace!("Received {} bytes: {}", line.len(), hex::encode(&line));

        Ok(line)
    }

    async fn drain(&mut self, grace: Duration) -> Result<usize> {
        let port = self.port.as_mut().ok_or(Error::NotConnected)?;
        let discarded = drain_lines(port, &mut self.read_buf, grace).await?;

        if discarded > 0 {
            debug!("Discarded {} late line(s) from {}", discarded, self.path);
        }

        Ok(discarded)
    }

    async fn recover(&mut self) -> Result<()> {
        self.read_buf.clear();
        if let Some(port) = self.port.as_ref() {
            debug!("Discarding pending input on {}", self.path);
            tokio_serial::SerialPort::clear(port, ClearBuffer::Input)?;
        }
        Ok(())
    }

    fn remote_addr(&self) -> String {
        self.path.clone()
    }
}

/// Transport for scales on a local serial port
pub struct SerialTransport {
    connection: Connection<SerialLink>,
}

impl SerialTransport {
    /// Open the serial device; failure to open is reported here, not retried
    pub fn new(path: &str) -> Result<Self> {
        Ok(Self {
            connection: Connection::new(SerialLink::open(path)?),
        })
    }

    /// Set write/read timeout
    pub fn with_io_timeout(mut self, timeout: Duration) -> Self {
        self.connection = self.connection.with_io_timeout(timeout);
        self
    }

    /// Set how many consecutive failures flush the input
    pub fn with_max_timeouts(mut self, max_timeouts: u32) -> Self {
        self.connection = self.connection.with_max_timeouts(max_timeouts);
        self
    }

    pub async fn state(&self) -> ConnectionState {
        self.connection.state().await
    }
}

#[async_trait]
impl Transport for SerialTransport {
    async fn open(&self) -> Result<()> {
        self.connection.open().await
    }

    async fn exchange(&self, command: Command) -> Option<String> {
        self.connection.exchange(command).await
    }

    async fn close(&self) {
        self.connection.close().await
    }

    fn remote_addr(&self) -> String {
        self.connection.remote_addr()
    }
}
