//! OpenAPI specification

use axum::http::header;
use axum::response::{IntoResponse, Json};
use utoipa::OpenApi;

use crate::api::routes::{files, health, upload};
use crate::api::types::ErrorBody;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Weiss API",
        version = env!("CARGO_PKG_VERSION"),
        description = "Content-addressed file ingestion"
    ),
    tags(
        (name = "health", description = "Health check endpoint"),
        (name = "files", description = "Upload and retrieval")
    ),
    paths(
        health::health,
        upload::upload,
        files::get_file,
        files::head_file,
        files::get_file_record,
    ),
    components(schemas(
        ErrorBody,
        health::HealthResponse,
        upload::UploadForm,
        files::FileRecordResponse,
    ))
)]
pub struct ApiDoc;

/// Serve OpenAPI JSON specification
pub async fn openapi_json() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "application/json")],
        Json(ApiDoc::openapi()),
    )
}
