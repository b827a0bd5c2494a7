//! Identifier registry
//!
//! Maps each digest to the shortest prefix of it that no other digest holds.
//! Claims go through `insert_if_absent`, so uniqueness of both identifier and
//! digest is decided by the database and concurrent resolves across service
//! instances need no extra locking.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use super::digest::Digest;
use super::error::RegistryError;
use crate::data::types::{ConflictField, FileRow, InsertOutcome, NewFileRow};
use crate::data::{DataError, RegistryRepository};

/// Result of resolving a digest
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub identifier: String,
    /// True only for the call that created the mapping
    pub is_new: bool,
}

impl Resolution {
    fn existing(row: FileRow) -> Self {
        Self {
            identifier: row.identifier,
            is_new: false,
        }
    }
}

#[derive(Clone)]
pub struct IdentifierRegistry {
    repository: Arc<dyn RegistryRepository>,
}

impl IdentifierRegistry {
    pub fn new(repository: Arc<dyn RegistryRepository>) -> Self {
        Self { repository }
    }

    /// Return the identifier for `digest`, claiming one if none exists
    ///
    /// Tries prefixes of increasing length, starting at one character. A
    /// digest conflict means another caller won the race for the same content;
    /// its identifier is returned with `is_new = false`. Cancellation is only
    /// observed between attempts, never during an insert.
    pub async fn resolve(
        &self,
        digest: &Digest,
        uploader: &str,
        cancel: &CancellationToken,
    ) -> Result<Resolution, RegistryError> {
        let repo = self.repository.as_ref();
        let full = digest.as_str();

        if cancel.is_cancelled() {
            return Err(RegistryError::Cancelled);
        }

        if let Some(row) = repo.find_by_digest(full).await.map_err(classify)? {
            tracing::debug!(identifier = %row.identifier, "Digest already registered");
            return Ok(Resolution::existing(row));
        }

        for len in 1..=full.len() {
            if cancel.is_cancelled() {
                tracing::warn!(digest = %full, attempts = len - 1, "Resolve cancelled");
                return Err(RegistryError::Cancelled);
            }

            let Some(candidate) = digest.prefix(len) else {
                break;
            };
            let outcome = repo
                .insert_if_absent(NewFileRow {
                    identifier: candidate,
                    digest: full,
                    uploader,
                })
                .await
                .map_err(classify)?;

            match outcome {
                InsertOutcome::Inserted(row) => {
                    tracing::debug!(identifier = %row.identifier, "Identifier claimed");
                    return Ok(Resolution {
                        identifier: row.identifier,
                        is_new: true,
                    });
                }
                InsertOutcome::Conflict(ConflictField::Identifier) => {
                    tracing::trace!(candidate, "Identifier taken");
                }
                InsertOutcome::Conflict(ConflictField::Digest) => {
                    return race_winner(repo, full).await;
                }
            }
        }

        // Postgres names only one violated constraint, so a concurrent writer
        // of the same digest can surface as identifier conflicts all the way.
        if let Some(row) = repo.find_by_digest(full).await.map_err(classify)? {
            return Ok(Resolution::existing(row));
        }

        tracing::warn!(digest = %full, "All prefixes of digest are taken");
        Err(RegistryError::IdentifierExhausted {
            digest: full.to_string(),
        })
    }
}

async fn race_winner(
    repo: &dyn RegistryRepository,
    digest: &str,
) -> Result<Resolution, RegistryError> {
    match repo.find_by_digest(digest).await.map_err(classify)? {
        Some(row) => {
            tracing::debug!(identifier = %row.identifier, "Digest registered concurrently");
            Ok(Resolution::existing(row))
        }
        None => {
            let message = format!("digest {digest} reported as taken but has no record");
            tracing::error!(%message, "Registry invariant violated");
            Err(RegistryError::InvariantViolation(message))
        }
    }
}

fn classify(e: DataError) -> RegistryError {
    let err = RegistryError::from(e);
    match &err {
        RegistryError::InvariantViolation(message) => {
            tracing::error!(%message, "Registry invariant violated");
        }
        RegistryError::Unavailable(source) => {
            tracing::warn!(error = %source, backend = source.backend(), "Registry unavailable");
        }
        _ => {}
    }
    err
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::data::{SqliteService, TransactionalService};
    use crate::domain::compute_digest;

    async fn memory_registry() -> (IdentifierRegistry, Arc<TransactionalService>) {
        let database = Arc::new(TransactionalService::sqlite_in_memory().await);
        (IdentifierRegistry::new(database.repository()), database)
    }

    async fn seed(database: &TransactionalService, identifier: &str, digest: &str) {
        let outcome = database
            .repository()
            .insert_if_absent(NewFileRow {
                identifier,
                digest,
                uploader: "seed",
            })
            .await
            .unwrap();
        assert!(matches!(outcome, InsertOutcome::Inserted(_)));
    }

    fn digest(s: &str) -> Digest {
        Digest::parse(s).unwrap()
    }

    #[tokio::test]
    async fn test_empty_registry_claims_one_character() {
        let (registry, database) = memory_registry().await;

        let resolution = registry
            .resolve(&digest("a1"), "alice", &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(
            resolution,
            Resolution {
                identifier: "a".into(),
                is_new: true
            }
        );

        let row = database
            .repository()
            .find_by_identifier("a")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(row.digest, "a1");
        assert_eq!(row.uploader, "alice");
    }

    #[tokio::test]
    async fn test_taken_prefix_extends_identifier() {
        let (registry, database) = memory_registry().await;
        seed(&database, "a", "ab").await;

        let resolution = registry
            .resolve(&digest("ac"), "bob", &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(resolution.identifier, "ac");
        assert!(resolution.is_new);
    }

    #[tokio::test]
    async fn test_known_digest_returns_existing() {
        let (registry, database) = memory_registry().await;
        seed(&database, "f", "ff00").await;

        let resolution = registry
            .resolve(&digest("ff00"), "carol", &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(resolution.identifier, "f");
        assert!(!resolution.is_new);
        assert_eq!(database.repository().count_files().await.unwrap(), 1);

        // uploader of the first claim is kept
        let row = database
            .repository()
            .find_by_digest("ff00")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(row.uploader, "seed");
    }

    #[tokio::test]
    async fn test_resolve_is_idempotent() {
        let (registry, _database) = memory_registry().await;
        let token = CancellationToken::new();
        let d = compute_digest(b"same bytes");

        let first = registry.resolve(&d, "", &token).await.unwrap();
        let second = registry.resolve(&d, "", &token).await.unwrap();
        assert!(first.is_new);
        assert!(!second.is_new);
        assert_eq!(first.identifier, second.identifier);
    }

    #[tokio::test]
    async fn test_all_prefixes_taken_is_exhausted() {
        let (registry, database) = memory_registry().await;
        seed(&database, "a", "a0").await;
        seed(&database, "ab", "ab0").await;

        let err = registry
            .resolve(&digest("ab"), "", &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(
            matches!(&err, RegistryError::IdentifierExhausted { digest } if digest == "ab"),
            "unexpected error: {err:?}"
        );
        assert_eq!(database.repository().count_files().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_cancelled_before_claim() {
        let (registry, database) = memory_registry().await;
        let token = CancellationToken::new();
        token.cancel();

        let err = registry
            .resolve(&digest("a1"), "", &token)
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::Cancelled));
        assert_eq!(database.repository().count_files().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_closed_database_is_unavailable() {
        let (registry, database) = memory_registry().await;
        database.close().await;

        let err = registry
            .resolve(&digest("a1"), "", &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::Unavailable(_)));
    }

    #[tokio::test]
    async fn test_identifiers_are_prefixes() {
        let (registry, _database) = memory_registry().await;
        let token = CancellationToken::new();

        for i in 0..64 {
            let d = compute_digest(format!("content-{i}").as_bytes());
            let resolution = registry.resolve(&d, "", &token).await.unwrap();
            assert!(d.as_str().starts_with(&resolution.identifier));
            assert!(!resolution.identifier.is_empty());
        }
    }

    async fn file_registry(
        dir: &tempfile::TempDir,
    ) -> (IdentifierRegistry, Arc<TransactionalService>) {
        let service = SqliteService::open(&dir.path().join("registry.db"))
            .await
            .unwrap();
        let database = Arc::new(TransactionalService::Sqlite(Arc::new(service)));
        (IdentifierRegistry::new(database.repository()), database)
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_distinct_digests() {
        let dir = tempfile::tempdir().unwrap();
        let (registry, database) = file_registry(&dir).await;

        let digests: Vec<Digest> = (0..32)
            .map(|i| compute_digest(format!("parallel-{i}").as_bytes()))
            .collect();

        let mut handles = Vec::new();
        for d in digests.clone() {
            let registry = registry.clone();
            handles.push(tokio::spawn(async move {
                let resolution = registry
                    .resolve(&d, "", &CancellationToken::new())
                    .await
                    .unwrap();
                (d, resolution)
            }));
        }

        let mut resolved = Vec::new();
        for handle in handles {
            resolved.push(handle.await.unwrap());
        }

        let identifiers: HashSet<&str> = resolved
            .iter()
            .map(|(_, r)| r.identifier.as_str())
            .collect();
        assert_eq!(identifiers.len(), digests.len());

        for (d, resolution) in &resolved {
            assert!(resolution.is_new);
            assert!(d.as_str().starts_with(&resolution.identifier));
            // every shorter prefix was already held when this one was claimed
            for len in 1..resolution.identifier.len() {
                assert!(identifiers.contains(&d.as_str()[..len]));
            }
        }

        assert_eq!(
            database.repository().count_files().await.unwrap(),
            digests.len() as i64
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_same_digest_single_winner() {
        let dir = tempfile::tempdir().unwrap();
        let (registry, database) = file_registry(&dir).await;
        let d = compute_digest(b"contended");

        let mut handles = Vec::new();
        for i in 0..16 {
            let registry = registry.clone();
            let d = d.clone();
            handles.push(tokio::spawn(async move {
                registry
                    .resolve(&d, &format!("user-{i}"), &CancellationToken::new())
                    .await
                    .unwrap()
            }));
        }

        let mut resolutions = Vec::new();
        for handle in handles {
            resolutions.push(handle.await.unwrap());
        }

        assert_eq!(resolutions.iter().filter(|r| r.is_new).count(), 1);
        let first = &resolutions[0].identifier;
        assert!(resolutions.iter().all(|r| &r.identifier == first));
        assert_eq!(database.repository().count_files().await.unwrap(), 1);
    }

    /// Repository replaying canned answers, for interleavings a real store
    /// only produces under contention
    #[derive(Default)]
    struct ScriptedRepository {
        lookups: std::sync::Mutex<std::collections::VecDeque<Option<FileRow>>>,
        inserts: std::sync::Mutex<std::collections::VecDeque<InsertOutcome>>,
    }

    impl ScriptedRepository {
        fn new(lookups: Vec<Option<FileRow>>, inserts: Vec<InsertOutcome>) -> Arc<Self> {
            Arc::new(Self {
                lookups: std::sync::Mutex::new(lookups.into()),
                inserts: std::sync::Mutex::new(inserts.into()),
            })
        }
    }

    #[async_trait::async_trait]
    impl RegistryRepository for ScriptedRepository {
        async fn find_by_digest(&self, _digest: &str) -> Result<Option<FileRow>, DataError> {
            Ok(self.lookups.lock().unwrap().pop_front().flatten())
        }

        async fn find_by_identifier(
            &self,
            _identifier: &str,
        ) -> Result<Option<FileRow>, DataError> {
            Ok(None)
        }

        async fn insert_if_absent(
            &self,
            _row: NewFileRow<'_>,
        ) -> Result<InsertOutcome, DataError> {
            Ok(self
                .inserts
                .lock()
                .unwrap()
                .pop_front()
                .expect("unexpected insert"))
        }

        async fn count_files(&self) -> Result<i64, DataError> {
            Ok(0)
        }
    }

    fn row(identifier: &str, digest: &str) -> FileRow {
        FileRow {
            identifier: identifier.into(),
            digest: digest.into(),
            uploader: "winner".into(),
            created_at: 0,
        }
    }

    #[tokio::test]
    async fn test_digest_conflict_returns_race_winner() {
        let repo = ScriptedRepository::new(
            vec![None, Some(row("a", "ab"))],
            vec![InsertOutcome::Conflict(ConflictField::Digest)],
        );
        let registry = IdentifierRegistry::new(repo.clone());

        let resolution = registry
            .resolve(&digest("ab"), "loser", &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(resolution, Resolution::existing(row("a", "ab")));
        assert!(repo.inserts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_digest_conflict_without_record_is_invariant_violation() {
        let repo = ScriptedRepository::new(
            vec![None, None],
            vec![InsertOutcome::Conflict(ConflictField::Digest)],
        );
        let registry = IdentifierRegistry::new(repo);

        let err = registry
            .resolve(&digest("ab"), "", &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(
            matches!(&err, RegistryError::InvariantViolation(m) if m.contains("ab")),
            "unexpected error: {err:?}"
        );
    }

    #[tokio::test]
    async fn test_identifier_conflicts_then_found_by_digest() {
        // Postgres reports the identifier constraint even when a concurrent
        // writer of the same digest holds every prefix
        let repo = ScriptedRepository::new(
            vec![None, Some(row("a", "ab"))],
            vec![
                InsertOutcome::Conflict(ConflictField::Identifier),
                InsertOutcome::Conflict(ConflictField::Identifier),
            ],
        );
        let registry = IdentifierRegistry::new(repo.clone());

        let resolution = registry
            .resolve(&digest("ab"), "", &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(resolution.identifier, "a");
        assert!(!resolution.is_new);
        assert!(repo.lookups.lock().unwrap().is_empty());
    }
}
