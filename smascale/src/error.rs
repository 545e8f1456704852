//! High-level error types

use smascale_core::Command;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Core protocol error: {0}")]
    Core(#[from] smascale_core::Error),

    #[error("Transport error: {0}")]
    Transport(#[from] smascale_transport::Error),

    #[error("No response from scale to {0}")]
    NoResponse(Command),
}

impl Error {
    /// Check if the scale sent something this client cannot decode
    pub fn is_protocol_violation(&self) -> bool {
        matches!(self, Self::Core(e) if e.is_protocol_violation())
    }
}
