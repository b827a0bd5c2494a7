//! Shared data types across transactional backends

mod transactional;

pub use transactional::{ConflictField, FileRow, InsertOutcome, NewFileRow};
