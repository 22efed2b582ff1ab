use thiserror::Error;

/// Errors surfaced by an [`crate::ObjectStore`] implementation.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{kind} {name:?} not found")]
    NotFound { kind: &'static str, name: String },

    #[error("{kind} {name:?} was modified concurrently: expected version {expected}, store has {actual}")]
    Conflict {
        kind: &'static str,
        name: String,
        expected: u64,
        actual: u64,
    },

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;
