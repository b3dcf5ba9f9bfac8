use thiserror::Error;

#[derive(Debug, Error)]
pub enum CourierError {
    #[error("Configuration error: {0}")]
    Config(String),

    /// The chat platform rejected or failed a call (lookup, DM channel, send).
    #[error("{0}")]
    Platform(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, CourierError>;
