use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Html;
use axum::routing::{get, post};
use axum::{Json, Router};
use glyphline::{ProcessState, RecognitionPipeline};
use serde::{Deserialize, Serialize};

/// Drawing page: 280x280 canvas downsampled to 28x28 in the browser.
const INDEX_HTML: &str = include_str!("../static/index.html");

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:5000".to_string(),
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<RecognitionPipeline>,
}

#[derive(Debug, Deserialize)]
pub struct PredictRequest {
    #[serde(default)]
    pub pixels: Vec<f32>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct PredictResponse {
    pub result: String,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/predict", post(predict))
        .route("/healthz", get(healthz))
        .with_state(state)
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

/// Always answers 200 with a textual result, whatever the body holds.
/// The body is parsed here rather than by the `Json` extractor, whose
/// rejections would reach the page as non-JSON 4xx responses.
pub async fn predict(State(state): State<AppState>, body: Bytes) -> Json<PredictResponse> {
    let request: PredictRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => {
            log::warn!("rejecting malformed predict body: {e}");
            return Json(PredictResponse {
                result: "Error".to_string(),
            });
        }
    };
    let result = state.pipeline.recognize_text(request.pixels).await;
    Json(PredictResponse { result })
}

/// 200 while the engine is ready, 503 otherwise. Nothing restarts a dead engine.
pub async fn healthz(State(state): State<AppState>) -> (StatusCode, &'static str) {
    match state.pipeline.state() {
        ProcessState::Ready => (StatusCode::OK, "ok"),
        ProcessState::Starting => (StatusCode::SERVICE_UNAVAILABLE, "starting"),
        ProcessState::Dead => (StatusCode::SERVICE_UNAVAILABLE, "dead"),
    }
}

/// Serves until `shutdown` resolves.
pub async fn serve(
    cfg: &ServerConfig,
    state: AppState,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(&cfg.bind_addr).await?;
    log::info!("glyphline server listening on http://{}", listener.local_addr()?);
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}
