use thiserror::Error;

#[derive(Debug, Error)]
pub enum SdkError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("malformed input: {0}")]
    MalformedInput(String),

    #[error("capture error: {0}")]
    Capture(#[from] dop_capture::CaptureError),

    #[error("temporal query error: {0}")]
    Temporal(#[from] dop_temporal::TemporalError),

    #[error("store error: {0}")]
    Store(#[from] dop_store::StoreError),

    #[error("ledger error: {0}")]
    Ledger(#[from] dop_ledger::LedgerError),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<dop_types::TypeError> for SdkError {
    fn from(e: dop_types::TypeError) -> Self {
        Self::MalformedInput(e.to_string())
    }
}

pub type SdkResult<T> = Result<T, SdkError>;
