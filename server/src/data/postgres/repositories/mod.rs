//! PostgreSQL repositories
//!
//! Row types live in `crate::data::types`.

pub mod file;

pub use file::{count_files, find_by_digest, find_by_identifier, insert_if_absent};
