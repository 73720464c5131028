use thiserror::Error;

/// Errors produced while parsing or converting foundation types.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TypeError {
    #[error("malformed input: {0}")]
    MalformedInput(String),

    #[error("invalid timestamp {value:?}: {reason}")]
    InvalidTimestamp { value: String, reason: String },

    #[error("serialization error: {0}")]
    Serialization(String),
}
