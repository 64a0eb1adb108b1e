//! HTTP request handlers
//!
//! Includes the pairing page, session download and static file serving.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::get,
    Json, Router,
};
use pairgate_auth::PairingSnapshot;
use pairgate_core::Error;
use pairgate_web::PairPage;
use std::sync::Arc;
use tower_http::services::ServeDir;
use tracing::{debug, error, warn};

use crate::state::AppState;

/// Body of `GET /`
pub const READY_MESSAGE: &str = "✅ Pairing Site Active";

/// Body returned for a download with an unknown session ID
pub const INVALID_SESSION_MESSAGE: &str = "❌ Invalid session ID";

/// Create the main application router
pub fn create_router(state: Arc<AppState>) -> Router {
    let public = ServeDir::new(&state.config.public_dir);

    Router::new()
        .route("/", get(index_handler))
        .route("/pair", get(pair_handler))
        .route("/download", get(invalid_download_handler))
        .route("/download/", get(invalid_download_handler))
        .route("/download/:id", get(download_handler))
        .route("/api/status", get(status_handler))
        // Static files
        .fallback_service(public)
        .with_state(state)
}

async fn index_handler() -> &'static str {
    READY_MESSAGE
}

/// Start pairing if needed and render the current state
async fn pair_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Html<String>, (StatusCode, String)> {
    let snapshot = state
        .initiator
        .ensure_started()
        .await
        .map_err(pairing_failure)?;

    render_pair_page(&snapshot)
        .map(Html)
        .ok_or_else(|| {
            error!("Pairing page template missing");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Pairing page unavailable".to_string(),
            )
        })
}

fn render_pair_page(snapshot: &PairingSnapshot) -> Option<String> {
    let session_id = snapshot.session_id.as_ref().map(|id| id.to_string());

    PairPage {
        qr_image: snapshot.qr_image.as_deref(),
        pairing_code: snapshot.pairing_code.as_deref(),
        session_id: session_id.as_deref(),
    }
    .render()
}

fn pairing_failure(err: Error) -> (StatusCode, String) {
    let status = match err {
        Error::HandshakeTimedOut(_) => StatusCode::GATEWAY_TIMEOUT,
        Error::Client(_) | Error::ConnectionClosed(_) => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };

    if err.is_transient() {
        (status, format!("⏳ {}. Please try again.", err))
    } else {
        error!("Pairing failed: {}", err);
        (status, format!("❌ {}", err))
    }
}

/// Stream the session archive if `id` is the issued session ID
async fn download_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Response {
    let Some(session_id) = state.pairing.find_session(&id) else {
        warn!("Download refused for session {:?}", id);
        return INVALID_SESSION_MESSAGE.into_response();
    };

    match state.exporter.export(&session_id).await {
        Ok(archive) => {
            debug!("Streaming {}", archive.name());
            archive.into_response()
        }
        Err(e) => {
            error!("Failed to export session {}: {}", session_id, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("❌ Failed to export session: {}", e),
            )
                .into_response()
        }
    }
}

async fn invalid_download_handler() -> &'static str {
    INVALID_SESSION_MESSAGE
}

/// Current pairing state as JSON
async fn status_handler(State(state): State<Arc<AppState>>) -> Json<PairingSnapshot> {
    Json(state.pairing.snapshot())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request};
    use pairgate_auth::{SessionStore, DATA_URI_PREFIX};
    use pairgate_bridge::testing::ScriptedClient;
    use pairgate_bridge::ClientEvent;
    use pairgate_core::Config;
    use serde_json::Value;
    use std::io::{Cursor, Read};
    use std::time::Duration;
    use tempfile::{tempdir, TempDir};
    use tower::ServiceExt;

    struct TestApp {
        router: Router,
        state: Arc<AppState>,
        client: ScriptedClient,
        dir: TempDir,
    }

    impl TestApp {
        fn new(timeout: Duration) -> Self {
            let dir = tempdir().unwrap();
            let public = dir.path().join("public");
            let archives = dir.path().join("archives");
            std::fs::create_dir(&public).unwrap();
            std::fs::create_dir(&archives).unwrap();
            std::fs::write(public.join("logo.txt"), "pairgate").unwrap();

            let config = Config::new()
                .with_session_dir(dir.path().join("session"))
                .with_public_dir(public)
                .with_archive_dir(archives)
                .with_handshake_timeout(timeout);

            let store = Arc::new(SessionStore::open(&config.session_dir).unwrap());
            std::fs::write(store.credentials_path(), r#"{"registered":true}"#).unwrap();

            let client = ScriptedClient::new();
            let state = Arc::new(AppState::new(config, Arc::new(client.clone()), store));
            let router = create_router(state.clone());

            Self {
                router,
                state,
                client,
                dir,
            }
        }

        async fn get(&self, uri: &str) -> Response {
            self.router
                .clone()
                .oneshot(Request::get(uri).body(Body::empty()).unwrap())
                .await
                .unwrap()
        }

        /// Emit `event` as soon as the scripted connection opens
        fn emit_when_connected(&self, event: ClientEvent) {
            let client = self.client.clone();
            tokio::spawn(async move {
                for _ in 0..200 {
                    if client.emit(event.clone()).await {
                        return;
                    }
                    tokio::time::sleep(Duration::from_millis(5)).await;
                }
            });
        }

        fn archive_dir_entries(&self) -> usize {
            std::fs::read_dir(self.dir.path().join("archives"))
                .unwrap()
                .count()
        }
    }

    async fn body_bytes(response: Response) -> Vec<u8> {
        to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap()
            .to_vec()
    }

    async fn status_json(app: &TestApp) -> Value {
        let bytes = body_bytes(app.get("/api/status").await).await;
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn body_text(response: Response) -> String {
        String::from_utf8(body_bytes(response).await).unwrap()
    }

    #[tokio::test]
    async fn test_index_is_static() {
        let app = TestApp::new(Duration::from_secs(5));

        let response = app.get("/").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, READY_MESSAGE);
        assert_eq!(app.client.connect_count(), 0);
    }

    #[tokio::test]
    async fn test_download_refused_before_pairing() {
        let app = TestApp::new(Duration::from_secs(5));

        for uri in ["/download/anything", "/download/", "/download"] {
            let response = app.get(uri).await;
            assert_eq!(response.status(), StatusCode::OK);
            assert_eq!(body_text(response).await, INVALID_SESSION_MESSAGE);
        }
        assert_eq!(app.archive_dir_entries(), 0);
    }

    #[tokio::test]
    async fn test_pair_shows_qr() {
        let app = TestApp::new(Duration::from_secs(5));
        app.emit_when_connected(ClientEvent::qr("2@abc,def,ghi"));

        let response = app.get("/pair").await;
        assert_eq!(response.status(), StatusCode::OK);
        let html = body_text(response).await;
        assert!(html.contains(DATA_URI_PREFIX));
        assert!(!html.contains(r#"class="code""#));
        assert!(!html.contains("/download/"));

        // Rendering again reuses the same connection
        let html = body_text(app.get("/pair").await).await;
        assert!(html.contains(DATA_URI_PREFIX));
        assert_eq!(app.client.connect_count(), 1);
    }

    #[tokio::test]
    async fn test_pair_timeout() {
        let app = TestApp::new(Duration::from_millis(50));

        let response = app.get("/pair").await;
        assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
        assert!(body_text(response).await.contains("timed out"));

        // The next request starts over
        app.get("/pair").await;
        assert_eq!(app.client.connect_count(), 2);
    }

    #[tokio::test]
    async fn test_pair_connection_refused() {
        let app = TestApp::new(Duration::from_secs(5));
        app.client.refuse_connections(true);

        let response = app.get("/pair").await;
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn test_pairing_code_then_download() {
        let app = TestApp::new(Duration::from_secs(5));
        app.emit_when_connected(ClientEvent::pairing_code("ABC-123"));

        let html = body_text(app.get("/pair").await).await;
        assert!(html.contains("ABC-123"));

        let session_id = app.state.pairing.snapshot().session_id.unwrap().to_string();
        assert!(html.contains(&format!("/download/{}", session_id)));

        let response = app.get("/download/wrong-id").await;
        assert_eq!(body_text(response).await, INVALID_SESSION_MESSAGE);

        let response = app.get(&format!("/download/{}", session_id)).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/zip");
        assert_eq!(
            response.headers()[header::CONTENT_DISPOSITION],
            format!("attachment; filename=\"session-{}.zip\"", session_id).as_str()
        );

        let bytes = body_bytes(response).await;
        assert_eq!(app.archive_dir_entries(), 0);

        let mut zip = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        assert_eq!(zip.len(), 1);
        let mut contents = String::new();
        zip.by_name("auth_info.json")
            .unwrap()
            .read_to_string(&mut contents)
            .unwrap();
        assert_eq!(contents, r#"{"registered":true}"#);
    }

    #[tokio::test]
    async fn test_status_reports_phase() {
        let app = TestApp::new(Duration::from_secs(5));

        let status = status_json(&app).await;
        assert_eq!(status["phase"], "idle");
        assert!(status["qr_image"].is_null());

        app.emit_when_connected(ClientEvent::pairing_code("ABC-123"));
        app.get("/pair").await;

        let status = status_json(&app).await;
        assert_eq!(status["phase"], "paired");
        assert_eq!(status["pairing_code"], "ABC-123");
        assert!(status["session_id"].is_string());
    }

    #[tokio::test]
    async fn test_public_assets() {
        let app = TestApp::new(Duration::from_secs(5));

        let response = app.get("/logo.txt").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "pairgate");

        let response = app.get("/missing.css").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
