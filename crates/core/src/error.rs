use crate::types::DbId;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: DbId },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("Conflict: {0}")]
    Conflict(String),
}

/// Failure of the change batch / change log persistence layer.
#[derive(Debug, Clone, thiserror::Error)]
pub enum StorageError {
    #[error("Storage error: {0}")]
    Backend(String),

    /// A row was rejected by a unique constraint (named `uq_*`).
    #[error("Storage error: duplicate value violates unique constraint {constraint}")]
    UniqueViolation { constraint: String },
}

impl StorageError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self::Backend(msg.into())
    }

    pub fn is_unique_violation(&self, constraint: &str) -> bool {
        matches!(self, Self::UniqueViolation { constraint: c } if c == constraint)
    }
}

/// Failure reported by the external entity store for a single read or write.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EntityStoreError {
    #[error("Entity '{0}' not found")]
    NotFound(String),

    #[error("Attribute '{0}' is not writable")]
    UnknownAttribute(String),

    #[error("Entity store call timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("Entity store failure: {0}")]
    Backend(String),
}
