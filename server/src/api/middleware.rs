//! Request plumbing: 404 fallback and per-request deadlines

use std::time::Duration;

use axum::extract::Request;
use axum::http::header;
use axum::response::IntoResponse;
use tokio_util::sync::CancellationToken;

use super::types::ApiError;

/// Handle 404 Not Found with logging
pub async fn handle_404(req: Request) -> impl IntoResponse {
    tracing::debug!(
        method = %req.method(),
        uri = %req.uri(),
        user_agent = req
            .headers()
            .get(header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .unwrap_or(""),
        "[404]"
    );
    ApiError::not_found("ROUTE_NOT_FOUND", format!("No route for {}", req.uri().path()))
}

/// Token cancelled at shutdown or after `timeout`, whichever comes first
///
/// Callers should hold a drop guard of the returned token so the timer task
/// ends with the request.
pub fn request_deadline(shutdown: &CancellationToken, timeout: Duration) -> CancellationToken {
    let token = shutdown.child_token();
    let timer = token.clone();
    tokio::spawn(async move {
        tokio::select! {
            _ = tokio::time::sleep(timeout) => {
                tracing::debug!(timeout_secs = timeout.as_secs(), "Request deadline reached");
                timer.cancel();
            }
            _ = timer.cancelled() => {}
        }
    });
    token
}
