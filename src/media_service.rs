//! Media Service.
//!
//! The local HTTP server each Scene Page loads against: serves the bundled
//! scene, answers `/health` and `/probe`, and hands out per-frame metadata.
//! A small `Router` with a shared `AppState`, no auth middleware crate, just
//! a manual header check against the per-run Shared Secret.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{Path as AxumPath, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::RunConfig;

const SECRET_HEADER: &str = "x-reelcore-secret";

#[derive(Clone)]
pub struct AppState {
    pub secret: Arc<str>,
    pub cfg: Arc<RunConfig>,
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
}

#[derive(Serialize)]
struct ProbeResponse {
    width: u32,
    height: u32,
    fps: u32,
    duration_frames: u64,
}

fn authorized(headers: &HeaderMap, state: &AppState) -> bool {
    headers
        .get(SECRET_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|v| v == &*state.secret)
        .unwrap_or(false)
}

async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse { status: "ok" })
}

async fn probe_handler(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if !authorized(&headers, &state) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    Json(ProbeResponse {
        width: state.cfg.width,
        height: state.cfg.height,
        fps: state.cfg.fps,
        duration_frames: state.cfg.duration_frames,
    })
    .into_response()
}

async fn frame_meta_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    AxumPath(frame_index): AxumPath<u64>,
) -> Response {
    if !authorized(&headers, &state) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    if frame_index >= state.cfg.duration_frames {
        return StatusCode::NOT_FOUND.into_response();
    }
    Json(serde_json::json!({ "frameIndex": frame_index })).into_response()
}

/// Builds the router serving the bundled scene directory — the same static
/// files a browser build would load from disk — alongside the metadata
/// endpoints.
pub fn router(state: AppState, scene_dir: &std::path::Path) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/probe", get(probe_handler))
        .route("/frame/:index", get(frame_meta_handler))
        .nest_service("/", ServeDir::new(scene_dir))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Binds an ephemeral port and serves `router` until the returned
/// `JoinHandle` is aborted. Returns the bound port so Scene Pages can be
/// pointed at it.
pub async fn serve(
    state: AppState,
    scene_dir: &std::path::Path,
) -> anyhow::Result<(u16, tokio::task::JoinHandle<()>)> {
    let app = router(state, scene_dir);
    let listener = TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0))).await?;
    let port = listener.local_addr()?.port();
    info!(port, "media service listening");

    let handle = tokio::spawn(async move {
        if let Err(err) = axum::serve(listener, app).await {
            tracing::error!(error = %err, "media service exited with error");
        }
    });

    Ok((port, handle))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::time::Duration;

    fn test_state() -> AppState {
        AppState {
            secret: Arc::from("test-secret"),
            cfg: Arc::new(RunConfig {
                start_frame: 0,
                duration_frames: 10,
                fps: 30,
                width: 640,
                height: 480,
                concurrency: 1,
                capture_method: crate::config::CaptureMethod::Screenshot,
                image_format: crate::config::ImageFormat::Png,
                jpeg_quality: 80,
                frame_render_timeout: Duration::from_secs(5),
                settle_delay: Duration::from_millis(10),
                raw_output: false,
                fail_on_page_errors: true,
                enable_frame_count_check: true,
                enable_hash_check: false,
                user_data: serde_json::Value::Null,
                scene_entry_path: PathBuf::from("/tmp/scene/index.html"),
                temp_dir: PathBuf::from("/tmp/reelcore-media-test"),
                output_path: None,
                encoder_path: PathBuf::from("ffmpeg"),
                probe_path: PathBuf::from("ffprobe"),
                headless: true,
                extension_dir: None,
            }),
        }
    }

    #[tokio::test]
    async fn health_requires_no_secret() {
        let response = health_handler().await.into_response();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn probe_rejects_missing_secret() {
        let state = test_state();
        let response = probe_handler(State(state), HeaderMap::new()).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn probe_accepts_matching_secret() {
        let state = test_state();
        let mut headers = HeaderMap::new();
        headers.insert(SECRET_HEADER, "test-secret".parse().unwrap());
        let response = probe_handler(State(state), headers).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn frame_meta_rejects_out_of_range_index() {
        let state = test_state();
        let mut headers = HeaderMap::new();
        headers.insert(SECRET_HEADER, "test-secret".parse().unwrap());
        let response = frame_meta_handler(State(state), headers, AxumPath(999)).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
