//! Type definitions for smascale

pub mod device_info;
pub mod error;
pub mod reading;

pub use device_info::DeviceInfo;
pub use error::{Error, Result};
pub use reading::{Measurement, Reading, Weight};
