use thiserror::Error;

/// Failures reported by a persistence collaborator (draft store, permanent
/// store, catalogue lookups). Always non-fatal to the caller.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage backend error: {0}")]
    Backend(String),

    #[error("stored record is corrupt: {0}")]
    Corrupt(String),

    #[error("{0} not found")]
    NotFound(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError::Backend(e.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Corrupt(e.to_string())
    }
}

#[derive(Debug, Error)]
pub enum SectionError {
    #[error("faculty id and subject id are required")]
    MissingIdentity,

    #[error("item index {index} out of range (len {len})")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("invalid field {field}: {reason}")]
    InvalidField { field: String, reason: String },

    #[error("{count} required field(s) missing")]
    Validation { count: usize },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("illegal state transition: {from} -> {to}")]
    IllegalTransition {
        from: &'static str,
        to: &'static str,
    },
}

impl SectionError {
    /// Stable IPC error code for this failure.
    pub fn code(&self) -> &'static str {
        match self {
            SectionError::MissingIdentity => "bad_params",
            SectionError::IndexOutOfRange { .. } => "bad_params",
            SectionError::InvalidField { .. } => "bad_params",
            SectionError::Validation { .. } => "validation_failed",
            SectionError::Store(_) => "store_failed",
            SectionError::IllegalTransition { .. } => "illegal_state",
        }
    }
}
