/// Errors from repository gateway operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// The referenced object does not exist.
    #[error("object not found: {0}")]
    NotFound(String),

    /// A search that expected exactly one result got zero or several.
    #[error("expected exactly one match for `{query}`, found {count}")]
    AmbiguousMatch { query: String, count: usize },

    /// Network or store-level failure.
    #[error("remote store failure: {0}")]
    Remote(String),

    /// Serialization or deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Result alias for gateway operations.
pub type StoreResult<T> = Result<T, StoreError>;
