use dop_store::StoreError;

/// Errors produced by ledger operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    #[error("{kind} not found: {reference}")]
    NotFound {
        kind: &'static str,
        reference: String,
    },

    #[error("malformed provenance record {id}: {reason}")]
    MalformedRecord { id: String, reason: String },

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// Result alias for ledger operations.
pub type LedgerResult<T> = Result<T, LedgerError>;
