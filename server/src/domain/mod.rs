//! Domain logic for content-addressed ingestion
//!
//! - `digest` - Content digests (SHA3-512, lowercase hex)
//! - `registry` - Digest to shortest-unused-prefix identifier assignment
//! - `ingest` - Upload orchestration: hash, resolve, store
//! - `error` - Error taxonomy shared by the above

pub mod digest;
pub mod error;
pub mod ingest;
pub mod registry;

pub use digest::{Digest, compute_digest};
pub use error::{DigestParseError, IngestError, RegistryError};
pub use ingest::{IngestService, Ingested, Upload, extension_of};
pub use registry::{IdentifierRegistry, Resolution};
