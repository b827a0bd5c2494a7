//! Upload endpoint
//!
//! `POST /u` with a multipart `file` field. Answers with a redirect to the
//! retrieval path, so plain HTML forms and `curl -L` both land on the file.

use axum::extract::{Multipart, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use utoipa::ToSchema;

use crate::api::AppState;
use crate::api::extractors::Uploader;
use crate::api::middleware::request_deadline;
use crate::api::types::ApiError;
use crate::core::constants::UPLOAD_FIELD;
use crate::domain::Upload;

/// Multipart form accepted by the upload endpoint
#[derive(Deserialize, ToSchema)]
pub struct UploadForm {
    /// File content; its filename contributes the extension
    #[schema(format = Binary, content_media_type = "application/octet-stream")]
    pub file: Vec<u8>,
}

/// Upload a file
#[utoipa::path(
    post,
    path = "/u",
    tag = "files",
    request_body(content = UploadForm, content_type = "multipart/form-data"),
    responses(
        (status = 302, description = "Stored; Location holds the retrieval path"),
        (status = 400, description = "Missing or malformed file field", body = crate::api::types::ErrorBody),
        (status = 413, description = "Upload exceeds the size limit", body = crate::api::types::ErrorBody),
        (status = 500, description = "Upload could not be completed", body = crate::api::types::ErrorBody)
    )
)]
pub async fn upload(
    State(state): State<AppState>,
    Uploader(uploader): Uploader,
    mut multipart: Multipart,
) -> Result<Response, ApiError> {
    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(ApiError::from_multipart)?
    {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }
        let filename = field.file_name().map(str::to_string);
        let bytes = field.bytes().await.map_err(ApiError::from_multipart)?;
        upload = Some(Upload {
            bytes: bytes.into(),
            filename,
            uploader,
        });
        break;
    }

    let upload = upload.ok_or_else(|| {
        ApiError::bad_request(
            "MISSING_FILE",
            format!("Multipart field '{UPLOAD_FIELD}' is required"),
        )
    })?;

    let cancel = request_deadline(&state.shutdown, state.request_timeout);
    let _deadline = cancel.clone().drop_guard();

    let ingested = state
        .ingest
        .ingest(upload, &cancel)
        .await
        .map_err(ApiError::from_ingest)?;

    Ok((StatusCode::FOUND, [(header::LOCATION, ingested.location())]).into_response())
}
