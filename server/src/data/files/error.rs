//! Content store error types

use thiserror::Error;

/// Errors from content store operations
#[derive(Error, Debug)]
pub enum FileStorageError {
    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Invalid object name: {0:?}")]
    InvalidName(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
