//! Upload ingestion
//!
//! Hash the bytes, resolve the digest to an identifier, and write the bytes to
//! the content store under `<identifier><extension>` when the identifier is
//! new. Known content is never written twice.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use super::digest::{Digest, compute_digest};
use super::error::IngestError;
use super::registry::IdentifierRegistry;
use crate::core::constants::{MAX_EXTENSION_LEN, RETRIEVAL_PREFIX, SHUTDOWN_TIMEOUT_SECS};
use crate::data::files::FileStorage;

/// A fully received upload
#[derive(Debug, Clone, Default)]
pub struct Upload {
    pub bytes: Vec<u8>,
    /// Client-supplied filename, only used for its extension
    pub filename: Option<String>,
    pub uploader: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Ingested {
    pub identifier: String,
    pub digest: Digest,
    /// Extension of this upload's filename, with leading dot, or empty
    pub extension: String,
    pub is_new: bool,
    pub size: usize,
}

impl Ingested {
    /// Name under which the content store holds the bytes of a new upload
    pub fn object_name(&self) -> String {
        format!("{}{}", self.identifier, self.extension)
    }

    /// Retrieval path handed back to the client
    pub fn location(&self) -> String {
        format!("{RETRIEVAL_PREFIX}{}", self.object_name())
    }
}

#[derive(Clone)]
pub struct IngestService {
    registry: IdentifierRegistry,
    store: Arc<dyn FileStorage>,
    tasks: TaskTracker,
}

impl IngestService {
    pub fn new(registry: IdentifierRegistry, store: Arc<dyn FileStorage>) -> Self {
        Self {
            registry,
            store,
            tasks: TaskTracker::new(),
        }
    }

    pub fn store(&self) -> &Arc<dyn FileStorage> {
        &self.store
    }

    /// Ingest one upload
    ///
    /// On a registry hit nothing is written and the extension of this upload
    /// is reported, even if the first upload of the content used another.
    ///
    /// The claim and the write run on a tracked task. Dropping the returned
    /// future stops the wait only; a claimed identifier always gets its bytes.
    pub async fn ingest(
        &self,
        upload: Upload,
        cancel: &CancellationToken,
    ) -> Result<Ingested, IngestError> {
        let Upload {
            bytes,
            filename,
            uploader,
        } = upload;
        let extension = filename.as_deref().map(extension_of).unwrap_or_default();

        let (digest, bytes) = tokio::task::spawn_blocking(move || {
            let digest = compute_digest(&bytes);
            (digest, bytes)
        })
        .await
        .map_err(|e| IngestError::HashingFailure(e.to_string()))?;

        let service = self.clone();
        let cancel = cancel.clone();
        self.tasks
            .spawn(async move {
                service
                    .claim_and_store(digest, bytes, extension, uploader, &cancel)
                    .await
            })
            .await
            .map_err(|e| IngestError::TaskFailure(e.to_string()))?
    }

    async fn claim_and_store(
        &self,
        digest: Digest,
        bytes: Vec<u8>,
        extension: String,
        uploader: String,
        cancel: &CancellationToken,
    ) -> Result<Ingested, IngestError> {
        let resolution = self.registry.resolve(&digest, &uploader, cancel).await?;

        let ingested = Ingested {
            identifier: resolution.identifier,
            digest,
            extension,
            is_new: resolution.is_new,
            size: bytes.len(),
        };

        if ingested.is_new {
            let name = ingested.object_name();
            if let Err(source) = self.store.store(&name, &bytes).await {
                tracing::error!(
                    identifier = %ingested.identifier,
                    name = %name,
                    error = %source,
                    "Identifier registered but content store write failed"
                );
                return Err(IngestError::Storage { name, source });
            }
        }

        tracing::info!(
            identifier = %ingested.identifier,
            is_new = ingested.is_new,
            size = ingested.size,
            uploader = %uploader,
            "File ingested"
        );
        Ok(ingested)
    }

    /// Wait for in-flight ingests, including those whose callers went away
    pub async fn drain(&self) {
        self.tasks.close();
        tracing::debug!(pending = self.tasks.len(), "Waiting for in-flight ingests");

        let timeout = Duration::from_secs(SHUTDOWN_TIMEOUT_SECS);
        if tokio::time::timeout(timeout, self.tasks.wait()).await.is_err() {
            tracing::warn!(
                pending = self.tasks.len(),
                timeout_secs = timeout.as_secs(),
                "Timeout waiting for in-flight ingests"
            );
        }
    }
}

/// Extension of the last path element, including the dot
///
/// Returns an empty string when there is no usable extension: no dot, a bare
/// trailing dot, characters outside `[A-Za-z0-9_-]`, or more than
/// `MAX_EXTENSION_LEN` characters after the dot.
pub fn extension_of(filename: &str) -> String {
    let base = filename.rsplit(['/', '\\']).next().unwrap_or(filename);
    let Some(dot) = base.rfind('.') else {
        return String::new();
    };
    let ext = &base[dot + 1..];
    let valid = !ext.is_empty()
        && ext.len() <= MAX_EXTENSION_LEN
        && ext
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_'));
    if valid {
        base[dot..].to_string()
    } else {
        String::new()
    }
}
