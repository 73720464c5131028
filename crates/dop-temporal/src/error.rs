use dop_ledger::LedgerError;
use dop_store::StoreError;
use dop_types::TypeError;

/// Errors from temporal queries. Absence is not an error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TemporalError {
    /// The query itself is malformed (e.g. an unparseable timestamp).
    #[error("malformed input: {0}")]
    MalformedInput(String),

    /// Network or store-level failure.
    #[error("remote store failure: {0}")]
    RemoteStore(String),
}

impl From<StoreError> for TemporalError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Remote(message) => Self::RemoteStore(message),
            other => Self::RemoteStore(other.to_string()),
        }
    }
}

impl From<LedgerError> for TemporalError {
    fn from(e: LedgerError) -> Self {
        match e {
            LedgerError::Store(inner) => inner.into(),
            other => Self::RemoteStore(other.to_string()),
        }
    }
}

impl From<TypeError> for TemporalError {
    fn from(e: TypeError) -> Self {
        Self::MalformedInput(e.to_string())
    }
}

/// Result alias for temporal queries.
pub type TemporalResult<T> = Result<T, TemporalError>;
