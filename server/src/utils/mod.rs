//! Utility functions for the application

pub mod basic_auth;
pub mod crypto;
pub mod file;
