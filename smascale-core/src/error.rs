//! Error types for smascale-core

/// Result type alias for protocol operations
pub type Result<T> = std::result::Result<T, Error>;

/// Protocol errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Frame id code is not a supported measurement mode
    #[error("Unsupported id code {0:?}: only net and gross weight are supported")]
    UnsupportedMode(String),

    /// Magnitude field is not a number
    #[error("Invalid mass field: {0:?}")]
    InvalidMass(String),

    /// Unknown command code
    #[error("Unknown command code: {0:?}")]
    UnknownCommand(String),
}

impl Error {
    /// Check if error means the device speaks something this client cannot decode
    pub fn is_protocol_violation(&self) -> bool {
        matches!(self, Self::UnsupportedMode(_) | Self::InvalidMass(_))
    }
}
