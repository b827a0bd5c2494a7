//! Data storage layer
//!
//! - `sqlite` - Embedded registry backend (default)
//! - `postgres` - Shared registry backend for multi-instance deployments
//! - `files` - Content store for uploaded bytes
//! - `types` - Row types shared by both backends
//! - `traits` - `RegistryRepository`, implemented by both backends
//! - `error` - Unified error type for all backends

pub mod error;
pub mod files;
pub mod postgres;
pub mod sqlite;
pub mod traits;
pub mod types;

pub use postgres::PostgresService;
pub use sqlite::SqliteService;

pub use error::DataError;
pub use traits::RegistryRepository;

use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::core::config::{PostgresConfig, TransactionalBackend};
use crate::core::storage::AppStorage;

/// Registry database service
///
/// Wraps the backend-specific service. Services are stored as Arc so the
/// repository handle can outlive a borrow of this enum.
pub enum TransactionalService {
    /// SQLite backend (default, embedded)
    Sqlite(Arc<SqliteService>),
    /// PostgreSQL backend (for distributed deployments)
    Postgres(Arc<PostgresService>),
}

impl TransactionalService {
    /// Initialize the registry service based on configuration
    ///
    /// For SQLite backend, uses the storage path.
    /// For PostgreSQL backend, requires a PostgresConfig.
    pub async fn init(
        backend: TransactionalBackend,
        storage: &AppStorage,
        postgres_config: Option<&PostgresConfig>,
    ) -> Result<Self, DataError> {
        match backend {
            TransactionalBackend::Sqlite => {
                let service = SqliteService::init(storage).await?;
                Ok(Self::Sqlite(Arc::new(service)))
            }
            TransactionalBackend::Postgres => {
                let config = postgres_config.ok_or_else(|| {
                    DataError::Config("PostgreSQL configuration required".to_string())
                })?;
                let service = PostgresService::init(config).await?;
                Ok(Self::Postgres(Arc::new(service)))
            }
        }
    }

    /// Run a WAL checkpoint (SQLite only)
    pub async fn checkpoint(&self) -> Result<(), DataError> {
        match self {
            Self::Sqlite(s) => s.checkpoint().await.map_err(Into::into),
            // autovacuum handles this
            Self::Postgres(_) => Ok(()),
        }
    }

    /// Close the database connection gracefully
    pub async fn close(&self) {
        match self {
            Self::Sqlite(s) => s.close().await,
            Self::Postgres(p) => p.close().await,
        }
    }

    /// Start the background checkpoint task (SQLite) or health check task (PostgreSQL)
    pub fn start_checkpoint_task(&self, shutdown_rx: watch::Receiver<bool>) -> JoinHandle<()> {
        match self {
            Self::Sqlite(s) => Arc::clone(s).start_checkpoint_task(shutdown_rx),
            Self::Postgres(p) => Arc::clone(p).start_health_check_task(shutdown_rx),
        }
    }

    /// Get the backend type
    pub fn backend(&self) -> TransactionalBackend {
        match self {
            Self::Sqlite(_) => TransactionalBackend::Sqlite,
            Self::Postgres(_) => TransactionalBackend::Postgres,
        }
    }

    /// Get the repository trait object for registry operations
    pub fn repository(&self) -> Arc<dyn RegistryRepository> {
        match self {
            Self::Sqlite(s) => Arc::new(Arc::clone(s)),
            Self::Postgres(p) => Arc::new(Arc::clone(p)),
        }
    }
}

#[cfg(test)]
impl TransactionalService {
    /// SQLite registry held in memory, schema applied
    pub async fn sqlite_in_memory() -> Self {
        let pool = sqlx::SqlitePool::connect(":memory:").await.unwrap();
        for statement in sqlite::schema::SCHEMA
            .split(';')
            .filter(|s| !s.trim().is_empty())
        {
            sqlx::query(statement.trim()).execute(&pool).await.unwrap();
        }
        Self::Sqlite(Arc::new(SqliteService::from_pool(pool)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::storage::DataSubdir;
    use crate::data::types::{InsertOutcome, NewFileRow};

    #[tokio::test]
    async fn test_init_sqlite_under_data_dir() {
        let temp = tempfile::tempdir().unwrap();
        let storage = AppStorage::init_for_test(temp.path().to_path_buf());
        tokio::fs::create_dir_all(storage.subdir(DataSubdir::Sqlite))
            .await
            .unwrap();

        let service = TransactionalService::init(TransactionalBackend::Sqlite, &storage, None)
            .await
            .unwrap();
        assert_eq!(service.backend(), TransactionalBackend::Sqlite);
        assert!(storage.subdir(DataSubdir::Sqlite).join("weiss.db").exists());

        let repo = service.repository();
        assert_eq!(repo.count_files().await.unwrap(), 0);
        service.checkpoint().await.unwrap();
        service.close().await;
    }

    #[tokio::test]
    async fn test_init_postgres_requires_config() {
        let temp = tempfile::tempdir().unwrap();
        let storage = AppStorage::init_for_test(temp.path().to_path_buf());

        let result =
            TransactionalService::init(TransactionalBackend::Postgres, &storage, None).await;
        assert!(matches!(result, Err(DataError::Config(_))));
    }

    #[tokio::test]
    async fn test_repository_handles_share_state() {
        let service = TransactionalService::sqlite_in_memory().await;
        let writer = service.repository();
        let reader = service.repository();

        let outcome = writer
            .insert_if_absent(NewFileRow {
                identifier: "c",
                digest: "c0ffee",
                uploader: "",
            })
            .await
            .unwrap();
        assert!(matches!(outcome, InsertOutcome::Inserted(_)));
        assert_eq!(reader.count_files().await.unwrap(), 1);
        assert!(reader.find_by_identifier("c").await.unwrap().is_some());
    }
}
