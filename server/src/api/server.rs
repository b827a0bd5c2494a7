//! API server initialization

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

use super::middleware;
use super::openapi::openapi_json;
use super::routes::{files, health, upload};
use crate::core::CoreApp;
use crate::core::constants::{API_PREFIX, UPLOAD_PATH};
use crate::data::TransactionalService;
use crate::domain::IngestService;

/// State shared by all handlers
#[derive(Clone)]
pub struct AppState {
    pub ingest: IngestService,
    pub database: Arc<TransactionalService>,
    /// Cancelled on shutdown; parent of every request deadline
    pub shutdown: CancellationToken,
    pub request_timeout: Duration,
}

/// Build the full router
///
/// The body limit only applies to the upload route.
pub fn router(state: AppState, max_upload_bytes: usize) -> Router {
    let upload_routes = Router::new()
        .route(UPLOAD_PATH, post(upload::upload))
        .layer(DefaultBodyLimit::max(max_upload_bytes));

    Router::new()
        .route("/f/{name}", get(files::get_file).head(files::head_file))
        .route(&format!("{API_PREFIX}/health"), get(health::health))
        .route(
            &format!("{API_PREFIX}/files/{{identifier}}"),
            get(files::get_file_record),
        )
        .route("/api/openapi.json", get(openapi_json))
        .merge(upload_routes)
        .fallback(middleware::handle_404)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

pub struct ApiServer {
    app: CoreApp,
}

impl ApiServer {
    pub fn new(app: CoreApp) -> Self {
        Self { app }
    }

    /// Returns CoreApp for graceful shutdown
    pub async fn start(self) -> Result<CoreApp> {
        let app = self.app;
        let shutdown = app.shutdown.clone();

        let addr = SocketAddr::new(app.config.server.host.parse()?, app.config.server.port);

        let state = AppState {
            ingest: app.ingest.clone(),
            database: Arc::clone(&app.database),
            shutdown: shutdown.cancellation_token(),
            request_timeout: Duration::from_secs(app.config.server.request_timeout_secs),
        };
        let router = router(state, app.config.server.max_upload_bytes);

        let listener = TcpListener::bind(addr).await?;
        tracing::info!(
            %addr,
            backend = %app.database.backend(),
            warehouse = %app.storage.warehouse_dir().display(),
            "Weiss listening"
        );

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown.wait())
            .await?;

        Ok(app)
    }
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{Request, StatusCode, header};
    use axum::response::Response;
    use tower::ServiceExt;

    use super::*;
    use crate::data::files::FilesystemStorage;
    use crate::domain::{IdentifierRegistry, compute_digest};

    const BOUNDARY: &str = "weiss-test-boundary";

    struct TestApp {
        router: Router,
        database: Arc<TransactionalService>,
        _dir: tempfile::TempDir,
    }

    async fn test_app(max_upload_bytes: usize) -> TestApp {
        let dir = tempfile::tempdir().unwrap();
        let store = FilesystemStorage::init(dir.path().join("warehouse"))
            .await
            .unwrap();
        let database = Arc::new(TransactionalService::sqlite_in_memory().await);
        let state = AppState {
            ingest: IngestService::new(
                IdentifierRegistry::new(database.repository()),
                Arc::new(store),
            ),
            database: Arc::clone(&database),
            shutdown: CancellationToken::new(),
            request_timeout: Duration::from_secs(30),
        };
        TestApp {
            router: router(state, max_upload_bytes),
            database,
            _dir: dir,
        }
    }

    fn multipart_request(field: &str, filename: &str, content: &[u8]) -> Request<Body> {
        let mut body = format!(
            "--{BOUNDARY}\r\n\
             Content-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\n\
             Content-Type: application/octet-stream\r\n\r\n"
        )
        .into_bytes();
        body.extend_from_slice(content);
        body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

        Request::builder()
            .method("POST")
            .uri("/u")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn location(response: &Response) -> String {
        response
            .headers()
            .get(header::LOCATION)
            .unwrap()
            .to_str()
            .unwrap()
            .to_string()
    }

    async fn body_bytes(response: Response) -> Vec<u8> {
        axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap()
            .to_vec()
    }

    #[tokio::test]
    async fn test_upload_redirects_and_serves() {
        let app = test_app(1024 * 1024).await;

        let response = app
            .router
            .clone()
            .oneshot(multipart_request("file", "cat.png", b"\x89PNG fake"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FOUND);
        let loc = location(&response);
        assert!(loc.starts_with("/f/"));
        assert!(loc.ends_with(".png"));

        let digest = compute_digest(b"\x89PNG fake");
        let identifier = loc.trim_start_matches("/f/").trim_end_matches(".png");
        assert!(digest.as_str().starts_with(identifier));

        let response = app.router.clone().oneshot(get(&loc)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let headers = response.headers();
        assert_eq!(headers[header::CONTENT_TYPE], "image/png");
        assert_eq!(
            headers[header::CACHE_CONTROL],
            "public, max-age=31536000, immutable"
        );
        assert_eq!(
            headers[header::ETAG],
            format!("\"{}\"", loc.trim_start_matches("/f/")).as_str()
        );
        assert_eq!(body_bytes(response).await, b"\x89PNG fake");
    }

    #[tokio::test]
    async fn test_duplicate_upload_same_identifier() {
        let app = test_app(1024 * 1024).await;

        let first = app
            .router
            .clone()
            .oneshot(multipart_request("file", "a.txt", b"twice"))
            .await
            .unwrap();
        let second = app
            .router
            .clone()
            .oneshot(multipart_request("file", "b.md", b"twice"))
            .await
            .unwrap();

        let first = location(&first);
        let second = location(&second);
        assert_eq!(
            first.trim_end_matches(".txt"),
            second.trim_end_matches(".md")
        );
        assert_eq!(app.database.repository().count_files().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_upload_records_basic_auth_user() {
        let app = test_app(1024 * 1024).await;

        let mut request = multipart_request("file", "notes", b"from alice");
        // alice:wonderland
        request.headers_mut().insert(
            header::AUTHORIZATION,
            "Basic YWxpY2U6d29uZGVybGFuZA==".parse().unwrap(),
        );
        let response = app.router.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::FOUND);

        let digest = compute_digest(b"from alice");
        let row = app
            .database
            .repository()
            .find_by_digest(digest.as_str())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(row.uploader, "alice");
        assert_eq!(location(&response), format!("/f/{}", row.identifier));
    }

    #[tokio::test]
    async fn test_upload_without_file_field() {
        let app = test_app(1024 * 1024).await;

        let response = app
            .router
            .clone()
            .oneshot(multipart_request("attachment", "a.txt", b"wrong field"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(app.database.repository().count_files().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_upload_over_limit() {
        let app = test_app(16).await;

        let response = app
            .router
            .clone()
            .oneshot(multipart_request("file", "big.bin", &[7u8; 1024]))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(app.database.repository().count_files().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_head_file() {
        let app = test_app(1024 * 1024).await;
        let response = app
            .router
            .clone()
            .oneshot(multipart_request("file", "doc.pdf", b"%PDF-1.7"))
            .await
            .unwrap();
        let loc = location(&response);

        let request = Request::builder()
            .method("HEAD")
            .uri(&loc)
            .body(Body::empty())
            .unwrap();
        let response = app.router.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/pdf");
        assert_eq!(response.headers()[header::CONTENT_LENGTH], "8");
        assert!(body_bytes(response).await.is_empty());
    }

    #[tokio::test]
    async fn test_missing_and_invalid_files() {
        let app = test_app(1024).await;

        let response = app.router.clone().oneshot(get("/f/abc.png")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = app.router.clone().oneshot(get("/f/.hidden")).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = app
            .router
            .clone()
            .oneshot(get("/f/..%2Fweiss.db"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_file_record_endpoint() {
        let app = test_app(1024 * 1024).await;
        let response = app
            .router
            .clone()
            .oneshot(multipart_request("file", "r.txt", b"record me"))
            .await
            .unwrap();
        let loc = location(&response);
        let identifier = loc.trim_start_matches("/f/").trim_end_matches(".txt");

        let response = app
            .router
            .clone()
            .oneshot(get(&format!("/api/v1/files/{identifier}")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body: serde_json::Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
        assert_eq!(body["identifier"], identifier);
        assert_eq!(body["digest"], compute_digest(b"record me").as_str());

        let response = app
            .router
            .clone()
            .oneshot(get("/api/v1/files/0123"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = app
            .router
            .clone()
            .oneshot(get("/api/v1/files/XYZ"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_health_and_openapi() {
        let app = test_app(1024).await;

        let response = app
            .router
            .clone()
            .oneshot(get("/api/v1/health"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body: serde_json::Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
        assert_eq!(body["status"], "ok");
        assert_eq!(body["files"], 0);

        let response = app
            .router
            .clone()
            .oneshot(get("/api/openapi.json"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_health_reports_dead_registry() {
        let app = test_app(1024).await;
        app.database.close().await;

        let response = app
            .router
            .clone()
            .oneshot(get("/api/v1/health"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_unknown_route() {
        let app = test_app(1024).await;
        let response = app.router.clone().oneshot(get("/nope")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
