//! HTTP surface: router, shared state, and error-to-status mapping.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Request},
    http::{HeaderValue, StatusCode, header},
    middleware::{self, Next},
    response::{Html, IntoResponse, Response},
    routing::{delete, get, post},
};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;

use crate::config::{ServerConfig, StorageBackend};
use crate::error::TransferError;
use crate::events::EventBroadcaster;
use crate::extract::{ContentExtractor, HeuristicExtractor};
use crate::registry::FileRegistry;
use crate::session::SessionStateMachine;
use crate::store::{BlobStore, MemoryStore, TransferStore};
use crate::vault::FileVault;

mod handlers;
pub mod qr;

const NOT_FOUND_HTML: &str = include_str!("static/404.html");

/// Room for multipart framing on top of the per-file ceiling.
const BODY_LIMIT_OVERHEAD: usize = 1024 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub store: Arc<dyn TransferStore>,
    pub vault: Arc<FileVault>,
    pub broadcaster: Arc<EventBroadcaster>,
    pub registry: Arc<FileRegistry>,
    pub sessions: Arc<SessionStateMachine>,
    pub extractor: Arc<dyn ContentExtractor>,
}

impl AppState {
    /// Wire up the stack for the configured backend.
    pub async fn build(config: ServerConfig) -> Result<Self, TransferError> {
        let store: Arc<dyn TransferStore> = match config.backend {
            StorageBackend::Memory => Arc::new(MemoryStore::new()),
            StorageBackend::Blob => Arc::new(BlobStore::open(&config.data_dir).await?),
        };
        let vault = Arc::new(FileVault::new(&config.data_dir));
        let broadcaster = Arc::new(EventBroadcaster::new());
        let registry = Arc::new(FileRegistry::new(store.clone(), broadcaster.clone()));
        let sessions = Arc::new(SessionStateMachine::new(
            store.clone(),
            broadcaster.clone(),
            vault.clone(),
        ));

        Ok(Self {
            config: Arc::new(config),
            store,
            vault,
            broadcaster,
            registry,
            sessions,
            extractor: Arc::new(HeuristicExtractor::new()),
        })
    }
}

impl IntoResponse for TransferError {
    fn into_response(self) -> Response {
        let status = match &self {
            TransferError::NotFound => StatusCode::NOT_FOUND,
            TransferError::NotOpen => StatusCode::GONE,
            TransferError::PayloadRejected(_) => StatusCode::BAD_REQUEST,
            TransferError::SaveConflict(_)
            | TransferError::Storage(_)
            | TransferError::Codec(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if self.is_internal() {
            tracing::error!("Request failed: {}", self);
        }
        (
            status,
            Json(serde_json::json!({ "error": self.to_string() })),
        )
            .into_response()
    }
}

/// Middleware to add security headers
async fn add_security_headers(req: Request, next: Next) -> Response {
    let mut response = next.run(req).await;
    let headers = response.headers_mut();

    headers.insert(
        header::CONTENT_SECURITY_POLICY,
        HeaderValue::from_static(
            "default-src 'self'; style-src 'self' 'unsafe-inline'; script-src 'self' 'unsafe-inline'; connect-src 'self'; img-src 'self' data:;",
        ),
    );
    headers.insert(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    );
    headers.insert(header::X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));
    headers.insert(
        header::REFERRER_POLICY,
        HeaderValue::from_static("no-referrer"),
    );

    response
}

async fn not_found_handler() -> (StatusCode, Html<&'static str>) {
    (StatusCode::NOT_FOUND, Html(NOT_FOUND_HTML))
}

/// Build the axum router over shared state.
pub fn create_router(state: AppState) -> Router {
    let body_limit = state.config.max_file_size as usize + BODY_LIMIT_OVERHEAD;

    Router::new()
        .route("/transfers", post(handlers::create_transfer))
        .route("/transfer/{id}", get(handlers::get_transfer))
        .route("/files/{id}", get(handlers::get_files))
        .route("/upload", get(handlers::upload_page))
        .route("/upload/{id}", post(handlers::upload))
        .route("/complete/{id}", post(handlers::complete))
        .route("/cancel/{id}", post(handlers::cancel))
        .route("/delete-all/{id}", delete(handlers::delete_all))
        .route("/events/{id}", get(handlers::events))
        .route("/content/{id}/{filename}", get(handlers::file_content))
        .route("/receive", get(handlers::receive_page))
        .route("/qr/{id}", get(handlers::qr_code))
        .fallback(not_found_handler)
        .layer(middleware::from_fn(add_security_headers))
        .layer(CorsLayer::permissive())
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(body_limit))
        .with_state(state)
}

/// Bind and serve until the token is cancelled.
pub async fn serve(state: AppState, cancel_token: CancellationToken) -> Result<()> {
    let addr: SocketAddr = format!("0.0.0.0:{}", state.config.port).parse()?;
    let router = create_router(state);
    let listener = TcpListener::bind(addr).await?;

    tracing::info!("HTTP server starting on http://{}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            cancel_token.cancelled().await;
            tracing::info!("HTTP server shutting down gracefully");
        })
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    async fn test_state() -> AppState {
        let dir = tempfile::tempdir().unwrap();
        let config = ServerConfig {
            data_dir: dir.keep(),
            ..Default::default()
        };
        AppState::build(config).await.unwrap()
    }

    #[tokio::test]
    async fn test_security_headers() {
        let router = create_router(test_state().await);

        let response = router
            .oneshot(
                Request::builder()
                    .uri("/receive")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        let headers = response.headers();
        assert!(headers.get("content-security-policy").is_some());
        assert_eq!(headers.get("x-content-type-options").unwrap(), "nosniff");
        assert_eq!(headers.get("x-frame-options").unwrap(), "DENY");
        assert_eq!(headers.get("referrer-policy").unwrap(), "no-referrer");
    }

    #[tokio::test]
    async fn unknown_routes_get_the_404_page() {
        let router = create_router(test_state().await);

        let response = router
            .oneshot(
                Request::builder()
                    .uri("/definitely-not-a-route")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn transfer_errors_map_to_status_codes() {
        assert_eq!(
            TransferError::NotFound.into_response().status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            TransferError::NotOpen.into_response().status(),
            StatusCode::GONE
        );
        assert_eq!(
            TransferError::PayloadRejected("bad".into())
                .into_response()
                .status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            TransferError::SaveConflict("t".into())
                .into_response()
                .status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
