use std::time::Duration;

use dop_ledger::LedgerError;
use dop_store::StoreError;
use dop_types::TypeError;

/// Errors surfaced by event capture.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CaptureError {
    /// A required field is missing or has the wrong shape.
    #[error("malformed input: {0}")]
    MalformedInput(String),

    /// A referenced entity, agent, event type or role does not exist.
    #[error("{kind} not found: {reference}")]
    NotFound { kind: String, reference: String },

    /// A search expected exactly one result.
    #[error("expected exactly one match for `{query}`, found {count}")]
    AmbiguousMatch { query: String, count: usize },

    /// Custom event data does not satisfy the event type's schema.
    #[error("schema validation failed: {}", .0.join("; "))]
    SchemaValidation(Vec<String>),

    /// Network or store-level failure.
    #[error("remote store failure: {0}")]
    RemoteStore(String),

    /// The capture queue is at capacity.
    #[error("capture queue is full")]
    QueueFull,

    /// The capture queue no longer accepts work.
    #[error("capture queue is closed")]
    QueueClosed,

    /// A capture job exceeded its time budget.
    #[error("capture timed out after {0:?}")]
    Timeout(Duration),
}

impl CaptureError {
    pub fn not_found(kind: impl Into<String>, reference: impl Into<String>) -> Self {
        Self::NotFound {
            kind: kind.into(),
            reference: reference.into(),
        }
    }
}

impl From<StoreError> for CaptureError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(reference) => Self::not_found("object", reference),
            StoreError::AmbiguousMatch { query, count } => Self::AmbiguousMatch { query, count },
            StoreError::Remote(message) | StoreError::Serialization(message) => {
                Self::RemoteStore(message)
            }
        }
    }
}

impl From<LedgerError> for CaptureError {
    fn from(e: LedgerError) -> Self {
        match e {
            LedgerError::NotFound { kind, reference } => Self::not_found(kind, reference),
            LedgerError::Store(inner) => inner.into(),
            other => Self::RemoteStore(other.to_string()),
        }
    }
}

impl From<TypeError> for CaptureError {
    fn from(e: TypeError) -> Self {
        Self::MalformedInput(e.to_string())
    }
}

/// Result alias for capture operations.
pub type CaptureResult<T> = Result<T, CaptureError>;
