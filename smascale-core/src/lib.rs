//! # smascale-core
//!
//! Core protocol implementation for SMA weighing scales.
//!
//! This crate provides the low-level protocol primitives:
//! - Command definitions and encoding
//! - Weight frame parsing
//! - Protocol constants

pub mod command;
pub mod constants;
pub mod error;
pub mod frame;

pub use command::Command;
pub use error::{Error, Result};
pub use frame::{Frame, UnitsCache, looks_like_weight};

/// Default TCP port of SMA ethernet scales
pub const DEFAULT_PORT: u16 = 49155;
