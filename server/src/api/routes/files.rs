//! File retrieval endpoints
//!
//! Objects never change once written, so responses are cacheable forever and
//! the object name doubles as the ETag.

use axum::Json;
use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderMap, HeaderValue, header};
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::api::AppState;
use crate::api::extractors::{IdentifierPath, ObjectName};
use crate::api::types::ApiError;

const IMMUTABLE_CACHE: &str = "public, max-age=31536000, immutable";

/// Registry record of one file
#[derive(Debug, Serialize, ToSchema)]
pub struct FileRecordResponse {
    pub identifier: String,
    pub digest: String,
    pub uploader: String,
    pub created_at: DateTime<Utc>,
}

fn object_headers(name: &str, len: usize) -> HeaderMap {
    let mut headers = HeaderMap::new();
    let mime = mime_guess::from_path(name).first_or_octet_stream();
    let content_type = HeaderValue::from_str(mime.essence_str())
        .unwrap_or(HeaderValue::from_static("application/octet-stream"));
    headers.insert(header::CONTENT_TYPE, content_type);
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static(IMMUTABLE_CACHE));
    if let Ok(etag) = HeaderValue::from_str(&format!("\"{name}\"")) {
        headers.insert(header::ETAG, etag);
    }
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(len));
    headers
}

/// Get file content
#[utoipa::path(
    get,
    path = "/f/{name}",
    tag = "files",
    params(("name" = String, Path, description = "Identifier plus optional extension")),
    responses(
        (status = 200, description = "File content"),
        (status = 400, description = "Invalid file name", body = crate::api::types::ErrorBody),
        (status = 404, description = "File not found", body = crate::api::types::ErrorBody)
    )
)]
pub async fn get_file(
    State(state): State<AppState>,
    ObjectName(name): ObjectName,
) -> Result<Response, ApiError> {
    let data = state
        .ingest
        .store()
        .get(&name)
        .await
        .map_err(ApiError::from_storage)?;

    Ok((object_headers(&name, data.len()), Body::from(data)).into_response())
}

/// Check that a file exists
#[utoipa::path(
    head,
    path = "/f/{name}",
    tag = "files",
    params(("name" = String, Path, description = "Identifier plus optional extension")),
    responses(
        (status = 200, description = "File exists"),
        (status = 400, description = "Invalid file name"),
        (status = 404, description = "File not found")
    )
)]
pub async fn head_file(
    State(state): State<AppState>,
    ObjectName(name): ObjectName,
) -> Result<Response, ApiError> {
    let data = state
        .ingest
        .store()
        .get(&name)
        .await
        .map_err(ApiError::from_storage)?;

    Ok((object_headers(&name, data.len()), Body::empty()).into_response())
}

/// Look up the registry record of an identifier
#[utoipa::path(
    get,
    path = "/api/v1/files/{identifier}",
    tag = "files",
    params(("identifier" = String, Path, description = "Assigned identifier")),
    responses(
        (status = 200, description = "Registry record", body = FileRecordResponse),
        (status = 400, description = "Invalid identifier", body = crate::api::types::ErrorBody),
        (status = 404, description = "Unknown identifier", body = crate::api::types::ErrorBody)
    )
)]
pub async fn get_file_record(
    State(state): State<AppState>,
    IdentifierPath(identifier): IdentifierPath,
) -> Result<Json<FileRecordResponse>, ApiError> {
    let row = state
        .database
        .repository()
        .find_by_identifier(&identifier)
        .await
        .map_err(ApiError::from_data)?
        .ok_or_else(|| {
            ApiError::not_found(
                "FILE_NOT_FOUND",
                format!("No file with identifier {identifier}"),
            )
        })?;

    Ok(Json(FileRecordResponse {
        created_at: DateTime::from_timestamp(row.created_at, 0).unwrap_or_default(),
        identifier: row.identifier,
        digest: row.digest,
        uploader: row.uploader,
    }))
}
