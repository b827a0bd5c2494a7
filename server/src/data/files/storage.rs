//! Content store trait definition

use async_trait::async_trait;

use super::error::FileStorageError;

/// Longest accepted object name. Identifiers are at most 128 hex chars and
/// extensions are capped well below the remainder.
pub const MAX_OBJECT_NAME_LEN: usize = 200;

/// Trait for content store backends
///
/// Objects are write-once: a name is only ever stored after the registry
/// has handed out a fresh identifier, and nothing is deleted.
#[async_trait]
pub trait FileStorage: Send + Sync {
    /// Store an object
    ///
    /// If an object with this name already exists it is left untouched.
    async fn store(&self, name: &str, data: &[u8]) -> Result<(), FileStorageError>;

    /// Retrieve an object, or `NotFound`
    async fn get(&self, name: &str) -> Result<Vec<u8>, FileStorageError>;

    /// Check if an object exists
    async fn exists(&self, name: &str) -> Result<bool, FileStorageError>;
}

/// Reject names that could escape the store or collide with temp files
///
/// Accepted: non-empty, no leading dot, ASCII alphanumerics plus `.`, `-`, `_`.
pub fn validate_object_name(name: &str) -> Result<(), FileStorageError> {
    let valid = !name.is_empty()
        && name.len() <= MAX_OBJECT_NAME_LEN
        && !name.starts_with('.')
        && name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'.' | b'-' | b'_'));
    if valid {
        Ok(())
    } else {
        Err(FileStorageError::InvalidName(name.to_string()))
    }
}
