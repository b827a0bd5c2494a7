//! Health check endpoint

use axum::Json;
use axum::extract::State;
use serde::Serialize;
use utoipa::ToSchema;

use crate::api::AppState;
use crate::api::types::ApiError;

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    /// Number of registered files
    pub files: i64,
}

/// Health check endpoint
///
/// Touches the registry, so a dead database reports 503.
#[utoipa::path(
    get,
    path = "/api/v1/health",
    tag = "health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
        (status = 503, description = "Registry unreachable", body = crate::api::types::ErrorBody)
    )
)]
pub async fn health(State(state): State<AppState>) -> Result<Json<HealthResponse>, ApiError> {
    let files = state
        .database
        .repository()
        .count_files()
        .await
        .map_err(|e| {
            tracing::warn!(error = %e, "Health check failed");
            ApiError::service_unavailable("Registry unavailable")
        })?;

    Ok(Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        files,
    }))
}
