pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Unknown measurement id code: {0:?}")]
    UnknownMeasurement(String),

    #[error("Parse error: {0}")]
    Parse(String),
}
