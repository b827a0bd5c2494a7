//! Repository traits for database backends
//!
//! Each transactional backend (SQLite, PostgreSQL) implements
//! [`RegistryRepository`] on top of its own repository functions.

use async_trait::async_trait;

use crate::data::error::DataError;
use crate::data::types::{FileRow, InsertOutcome, NewFileRow};

/// Durable digest/identifier registry
///
/// Both `identifier` and `digest` are unique, and the store enforces that
/// itself. `insert_if_absent` is a single atomic statement: it either
/// inserts the row or reports which uniqueness rule it collided with.
#[async_trait]
pub trait RegistryRepository: Send + Sync {
    async fn find_by_digest(&self, digest: &str) -> Result<Option<FileRow>, DataError>;

    async fn find_by_identifier(&self, identifier: &str) -> Result<Option<FileRow>, DataError>;

    async fn insert_if_absent(&self, row: NewFileRow<'_>) -> Result<InsertOutcome, DataError>;

    async fn count_files(&self) -> Result<i64, DataError>;
}
