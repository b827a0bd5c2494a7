//! Content store
//!
//! Raw upload bytes live outside the registry database, one object per
//! registered file, named `{identifier}{extension}`:
//!
//! ```text
//! {warehouse}/
//! ├── 3.png
//! ├── a7.txt
//! └── f0c
//! ```
//!
//! - `storage` - Trait definition for content store backends
//! - `filesystem` - Local warehouse directory implementation
//! - `error` - Error types for content store operations

pub mod error;
pub mod filesystem;
pub mod storage;

pub use error::FileStorageError;
pub use filesystem::FilesystemStorage;
pub use storage::{FileStorage, validate_object_name};
