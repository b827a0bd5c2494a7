//! Filesystem-based content store
//!
//! Stores objects flat in the warehouse directory: `{base_path}/{name}`.
//! Writes go to a hidden temp file in the same directory and are renamed
//! into place, so readers never observe a partial object.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;

use super::error::FileStorageError;
use super::storage::{FileStorage, validate_object_name};

/// Filesystem-based content store
#[derive(Debug, Clone)]
pub struct FilesystemStorage {
    base_path: PathBuf,
}

impl FilesystemStorage {
    /// Create the warehouse directory if needed
    pub async fn init(base_path: PathBuf) -> Result<Self, FileStorageError> {
        fs::create_dir_all(&base_path).await?;
        tracing::debug!(path = %base_path.display(), "Warehouse ready");
        Ok(Self { base_path })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn object_path(&self, name: &str) -> Result<PathBuf, FileStorageError> {
        validate_object_name(name)?;
        Ok(self.base_path.join(name))
    }

    fn temp_path(&self, name: &str) -> PathBuf {
        self.base_path
            .join(format!(".{}.{}.tmp", name, uuid::Uuid::new_v4().simple()))
    }
}

#[async_trait]
impl FileStorage for FilesystemStorage {
    async fn store(&self, name: &str, data: &[u8]) -> Result<(), FileStorageError> {
        let path = self.object_path(name)?;

        if fs::try_exists(&path).await? {
            tracing::warn!(name, "Object already exists, keeping stored copy");
            return Ok(());
        }

        let temp = self.temp_path(name);
        fs::write(&temp, data).await?;
        if let Err(e) = fs::rename(&temp, &path).await {
            fs::remove_file(&temp).await.ok();
            return Err(FileStorageError::Io(e));
        }

        tracing::debug!(
            name,
            size = data.len(),
            path = %path.display(),
            "Object stored"
        );
        Ok(())
    }

    async fn get(&self, name: &str) -> Result<Vec<u8>, FileStorageError> {
        let path = self.object_path(name)?;

        // Map ENOENT instead of checking first; the check would race the read
        fs::read(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                FileStorageError::NotFound(name.to_string())
            } else {
                FileStorageError::Io(e)
            }
        })
    }

    async fn exists(&self, name: &str) -> Result<bool, FileStorageError> {
        let path = self.object_path(name)?;
        Ok(fs::try_exists(&path).await?)
    }
}
