//! # smascale
//!
//! Async client for weighing scales speaking the Scale Manufacturers
//! Association (SMA) protocol, such as Sartorius and Minebea Intec models.
//!
//! ## Features
//!
//! - TCP (ethernet scales) and serial (RS-232) transports
//! - Automatic reconnection with log-once failure reporting
//! - Commands serialized per scale, safe to share across tasks
//! - Net/gross weight, stability, tare, and device info
//!
//! ## Quick Start
//!
//! ```no_run
//! use smascale::Scale;
//!
//! #[tokio::main]
//! async fn main() -> smascale::Result<()> {
//!     let scale = Scale::tcp("192.168.1.50:49155")?;
//!
//!     scale.zero().await?;
//!     println!("{}", scale.get().await?);
//!
//!     if let Some(info) = scale.get_info().await? {
//!         println!("{}", info);
//!     }
//!
//!     scale.close().await;
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod scale;

// Re-exports
pub use error::{Error, Result};
pub use scale::Scale;

pub use smascale_core::{Command, DEFAULT_PORT, Frame};
pub use smascale_transport::{SerialTransport, TcpTransport, Transport, with_default_port};
pub use smascale_types::{DeviceInfo, Measurement, Reading, Weight};
