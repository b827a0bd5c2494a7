//! API route handlers

pub mod files;
pub mod health;
pub mod upload;
