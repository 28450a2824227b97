//! Storage layer error types.

use thiserror::Error;

/// Errors that can occur in the storage layer.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid {what} length: expected {expected} bytes, got {actual}")]
    InvalidArgument {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("Page is full: requires {required} bytes but only {available} available")]
    OutOfSpace { required: usize, available: usize },

    #[error("Corrupted page: {reason}")]
    CorruptedPage { reason: String },

    #[error("Invalid page layout: {reason}")]
    InvalidLayout { reason: String },

    #[error("Store is closed")]
    Closed,

    #[error("Store is poisoned by an earlier failed write; reopen it")]
    Poisoned,
}

impl StorageError {
    /// True for failures that come from (or stand in for) the file system.
    pub fn is_io_class(&self) -> bool {
        matches!(
            self,
            StorageError::Io(_)
                | StorageError::CorruptedPage { .. }
                | StorageError::Closed
                | StorageError::Poisoned
        )
    }
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;
