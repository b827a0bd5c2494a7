//! HTTP surface: upload, retrieval, health and OpenAPI

pub mod extractors;
pub mod middleware;
pub mod openapi;
pub mod routes;
mod server;
pub mod types;

pub use server::{ApiServer, AppState, router};
