//! Transport layer for SMA scales
//!
//! Provides TCP and serial communication with devices. Both media share one
//! [`Connection`], which serializes exchanges, bounds every step with a
//! timeout and replaces stale links.

pub mod connection;
pub mod error;
pub mod line;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod serial;
pub mod tcp;

pub use connection::{Connection, ConnectionState};
pub use error::{Error, Result};
pub use serial::{SerialLink, SerialTransport};
pub use tcp::{TcpLink, TcpTransport, with_default_port};

use std::time::Duration;

use async_trait::async_trait;
use bytes::BytesMut;

use smascale_core::Command;

/// A byte-stream link to one device
///
/// Implementations do raw I/O only. Locking, timeouts and failure counting
/// are handled by [`Connection`].
#[async_trait]
pub trait Link: Send {
    /// Connect to device
    async fn connect(&mut self) -> Result<()>;

    /// Disconnect from device; no-op when already disconnected
    async fn disconnect(&mut self) -> Result<()>;

    /// Check if connected
    fn is_connected(&self) -> bool;

    /// Send raw bytes
    async fn send(&mut self, data: &[u8]) -> Result<()>;

    /// Receive one line, terminator included
    async fn receive_line(&mut self) -> Result<BytesMut>;

    /// Throw away replies that arrive late, waiting at most `grace` for each
    ///
    /// Called before the next write when a reply went unread. Returns the
    /// number of lines discarded.
    async fn drain(&mut self, grace: Duration) -> Result<usize>;

    /// Get the link back to a known state after repeated failures
    ///
    /// Defaults to disconnecting, so the next exchange connects afresh.
    async fn recover(&mut self) -> Result<()> {
        self.disconnect().await
    }

    /// Get remote address
    fn remote_addr(&self) -> String;
}

/// Request/response channel to one scale
#[async_trait]
pub trait Transport: Send + Sync {
    /// Connect now instead of on the first exchange
    async fn open(&self) -> Result<()>;

    /// Send `command` and read one response line
    ///
    /// Returns `None` when the device could not be reached or did not
    /// answer in time. At most one exchange is in flight per transport.
    async fn exchange(&self, command: Command) -> Option<String>;

    /// Close the connection; safe to call repeatedly
    async fn close(&self);

    /// Get remote address
    fn remote_addr(&self) -> String;
}
