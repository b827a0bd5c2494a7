//! RegistryRepository trait implementation for PostgreSQL

use std::sync::Arc;

use async_trait::async_trait;

use crate::data::error::DataError;
use crate::data::traits::RegistryRepository;
use crate::data::types::{FileRow, InsertOutcome, NewFileRow};

use super::PostgresService;
use super::repositories::file;

#[async_trait]
impl RegistryRepository for Arc<PostgresService> {
    async fn find_by_digest(&self, digest: &str) -> Result<Option<FileRow>, DataError> {
        file::find_by_digest(self.pool(), digest)
            .await
            .map_err(Into::into)
    }

    async fn find_by_identifier(&self, identifier: &str) -> Result<Option<FileRow>, DataError> {
        file::find_by_identifier(self.pool(), identifier)
            .await
            .map_err(Into::into)
    }

    async fn insert_if_absent(&self, row: NewFileRow<'_>) -> Result<InsertOutcome, DataError> {
        file::insert_if_absent(self.pool(), row)
            .await
            .map_err(Into::into)
    }

    async fn count_files(&self) -> Result<i64, DataError> {
        file::count_files(self.pool()).await.map_err(Into::into)
    }
}
