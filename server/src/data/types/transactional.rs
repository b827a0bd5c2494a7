//! Registry row types shared by the SQLite and PostgreSQL backends

use serde::Serialize;

/// A registered file: the binding between a digest and its short identifier
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileRow {
    pub identifier: String,
    pub digest: String,
    pub uploader: String,
    /// Unix seconds
    pub created_at: i64,
}

/// Candidate record for a single claim attempt
#[derive(Debug, Clone, Copy)]
pub struct NewFileRow<'a> {
    pub identifier: &'a str,
    pub digest: &'a str,
    pub uploader: &'a str,
}

/// Which uniqueness rule rejected an insert
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictField {
    Identifier,
    Digest,
}

/// Result of an atomic insert-if-absent
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted(FileRow),
    Conflict(ConflictField),
}
