//! Error taxonomy for the ingestion core
//!
//! Every variant is surfaced to callers unchanged. The HTTP layer collapses
//! them into a generic server error; `kind()` keeps the precise class for logs.

use thiserror::Error;

use crate::data::DataError;
use crate::data::files::FileStorageError;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum DigestParseError {
    #[error("Digest is empty")]
    Empty,
    #[error("Invalid digest character {found:?} at position {position}")]
    InvalidCharacter { position: usize, found: char },
}

#[derive(Error, Debug)]
pub enum RegistryError {
    /// The durable store could not be reached or failed mid-operation
    #[error("Registry unavailable: {0}")]
    Unavailable(#[source] DataError),

    /// Every prefix of the digest, up to the full digest, is already an identifier
    #[error("No unused identifier left for digest {digest}")]
    IdentifierExhausted { digest: String },

    /// A conflict or store state the registry cannot explain
    #[error("Registry invariant violated: {0}")]
    InvariantViolation(String),

    /// The caller's deadline or shutdown fired before a claim succeeded
    #[error("Resolve cancelled")]
    Cancelled,
}

impl From<DataError> for RegistryError {
    fn from(e: DataError) -> Self {
        match e {
            DataError::ConstraintViolation { .. } => Self::InvariantViolation(e.to_string()),
            other => Self::Unavailable(other),
        }
    }
}

#[derive(Error, Debug)]
pub enum IngestError {
    /// The hashing task died (panic or runtime shutdown)
    #[error("Hashing failed: {0}")]
    HashingFailure(String),

    /// The task claiming the identifier and writing the bytes died
    #[error("Ingest task failed: {0}")]
    TaskFailure(String),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// The identifier was claimed but the bytes could not be written
    #[error("Content store write failed for {name}: {source}")]
    Storage {
        name: String,
        #[source]
        source: FileStorageError,
    },
}

impl IngestError {
    /// Stable name of the failure class, for logs
    pub fn kind(&self) -> &'static str {
        match self {
            Self::HashingFailure(_) => "hashing_failure",
            Self::TaskFailure(_) => "task_failure",
            Self::Registry(RegistryError::Unavailable(_)) => "registry_unavailable",
            Self::Registry(RegistryError::IdentifierExhausted { .. }) => "identifier_exhausted",
            Self::Registry(RegistryError::InvariantViolation(_)) => {
                "registry_invariant_violation"
            }
            Self::Registry(RegistryError::Cancelled) => "cancelled",
            Self::Storage { .. } => "content_store_failure",
        }
    }

    /// Whether a caller may reasonably retry the same upload
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Registry(RegistryError::Unavailable(e)) => e.is_transient(),
            Self::Registry(RegistryError::Cancelled) => true,
            _ => false,
        }
    }
}
