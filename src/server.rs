//! HTTP routes

use axum::{
    Json, Router,
    body::Body,
    extract::{Path, State},
    http::{HeaderValue, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use bytes::Bytes;
use futures::StreamExt;
use std::convert::Infallible;
use std::path::Path as FsPath;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;
use tracing::info;
use uuid::Uuid;

use ragstream_core::{ChainInput, Pipeline};
use ragstream_relay::{EventClassifier, SseRelay};

/// Shared, read-only request context built once at startup
#[derive(Clone)]
pub struct AppState {
    pipeline: Arc<dyn Pipeline>,
    classifier: EventClassifier,
}

impl AppState {
    /// The classifier always matches the pipeline's variant
    pub fn new(pipeline: Arc<dyn Pipeline>) -> Self {
        let classifier = EventClassifier::new(pipeline.variant());
        Self {
            pipeline,
            classifier,
        }
    }
}

pub fn router(state: AppState, static_dir: &FsPath) -> Router {
    Router::new()
        .route("/chat_stream/{message}", get(chat_stream_get))
        .route("/chat_stream", post(chat_stream_post))
        .route("/health", get(health))
        .route_service("/", ServeFile::new(static_dir.join("index.html")))
        .nest_service("/static", ServeDir::new(static_dir))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer())
        .with_state(state)
}

fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
}

async fn health() -> &'static str {
    "Ok"
}

async fn chat_stream_get(State(state): State<AppState>, Path(message): Path<String>) -> Response {
    stream_answer(&state, ChainInput::new(message))
}

async fn chat_stream_post(State(state): State<AppState>, Json(input): Json<ChainInput>) -> Response {
    stream_answer(&state, input)
}

fn stream_answer(state: &AppState, input: ChainInput) -> Response {
    let request_id = Uuid::new_v4().to_string();
    info!(
        request_id = %request_id,
        history = input.chat_history.len(),
        "Answering question: {}",
        input.question
    );

    let events = state.pipeline.stream_events(input);
    let frames = SseRelay::new(events, state.classifier.clone())
        .map(|frame| Ok::<_, Infallible>(Bytes::from(frame)));

    let mut response = (
        [
            (header::CONTENT_TYPE, "text/event-stream"),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        Body::from_stream(frames),
    )
        .into_response();
    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert("x-request-id", value);
    }
    response
}
