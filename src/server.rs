//! HTTP server.
//!
//! Exposes the question-answering pipeline as a JSON API for the chat layer:
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/chat/{tenant_id}/query` | Answer a question, non-streaming |
//! | `POST` | `/chat/{tenant_id}/stream` | Answer a question over SSE |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Error Contract
//!
//! All error responses carry a machine-readable code and a human-readable
//! message:
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "message must not be empty" } }
//! ```
//!
//! Error codes: `bad_request` (400), `unauthorized` (401),
//! `retrieval_unavailable` (503), `internal` (500).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted so browser widgets can
//! talk to the API cross-origin.
//!
//! # Identity
//!
//! Bearer-token verification is an external collaborator. The
//! [`TokenVerifier`] trait captures the contract (token → user/tenant); the
//! default [`PassthroughVerifier`] accepts every request as anonymous.

use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::sse::{Event, KeepAlive, Sse},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use futures_util::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use uuid::Uuid;

use answer_harness_core::models::ContactSheet;
use answer_harness_core::retrieve::Retriever;

use crate::answer::Synthesizer;
use crate::config::Config;
use crate::stream::{answer_stream, frame_json};

/// Identity resolved from a bearer credential by the external provider.
#[derive(Debug, Clone, Default)]
pub struct Identity {
    pub user_id: Option<String>,
    pub tenant_id: Option<String>,
}

/// Contract with the external identity provider: verify a bearer token and
/// resolve the caller. Issuance and validation live outside this service.
pub trait TokenVerifier: Send + Sync {
    fn verify(&self, bearer: Option<&str>) -> Result<Identity, String>;
}

/// Accepts every request as anonymous. Stands in for the real identity
/// provider in development and tests.
pub struct PassthroughVerifier;

impl TokenVerifier for PassthroughVerifier {
    fn verify(&self, _bearer: Option<&str>) -> Result<Identity, String> {
        Ok(Identity::default())
    }
}

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub retriever: Arc<Retriever>,
    pub synthesizer: Arc<Synthesizer>,
    pub verifier: Arc<dyn TokenVerifier>,
}

/// Start the HTTP server on the configured bind address. Runs until the
/// process is terminated.
pub async fn run_server(state: AppState) -> anyhow::Result<()> {
    let bind_addr = state.config.server.bind.clone();

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/chat/{tenant_id}/query", post(handle_query))
        .route("/chat/{tenant_id}/stream", post(handle_stream))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(state);

    tracing::info!(bind = %bind_addr, "chat API listening");

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

fn unauthorized(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::UNAUTHORIZED,
        code: "unauthorized".to_string(),
        message: message.into(),
    }
}

fn retrieval_unavailable(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::SERVICE_UNAVAILABLE,
        code: "retrieval_unavailable".to_string(),
        message: message.into(),
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ POST /chat/{tenant_id}/query ============

#[derive(Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Serialize)]
pub struct ChatResponse {
    pub answer: String,
    pub session_id: String,
    pub sources: Vec<String>,
    pub contact_info: ContactSheet,
    pub categories: Vec<String>,
    pub providers: Vec<String>,
    pub message_id: String,
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}

async fn handle_query(
    State(state): State<AppState>,
    Path(tenant_id): Path<String>,
    headers: HeaderMap,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, AppError> {
    state
        .verifier
        .verify(bearer_token(&headers))
        .map_err(unauthorized)?;

    if request.message.trim().is_empty() {
        return Err(bad_request("message must not be empty"));
    }

    let session_id = request
        .session_id
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    tracing::debug!(tenant_id, "chat query received");

    let passages = state
        .retriever
        .retrieve(&request.message, &tenant_id)
        .await
        .map_err(|err| retrieval_unavailable(err.to_string()))?;

    let answer = state
        .synthesizer
        .synthesize(&request.message, &passages)
        .await;

    Ok(Json(ChatResponse {
        answer: answer.text,
        session_id,
        sources: answer.sources,
        contact_info: answer.structured.contacts,
        categories: answer.structured.categories,
        providers: answer.structured.providers,
        message_id: Uuid::new_v4().to_string(),
    }))
}

// ============ POST /chat/{tenant_id}/stream ============

async fn handle_stream(
    State(state): State<AppState>,
    Path(tenant_id): Path<String>,
    headers: HeaderMap,
    Json(request): Json<ChatRequest>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    state
        .verifier
        .verify(bearer_token(&headers))
        .map_err(unauthorized)?;

    if request.message.trim().is_empty() {
        return Err(bad_request("message must not be empty"));
    }

    let session_id = request
        .session_id
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    tracing::debug!(tenant_id, "streaming chat query received");

    let frames = answer_stream(
        state.retriever.clone(),
        state.synthesizer.clone(),
        request.message,
        tenant_id,
        session_id,
    );

    let events = frames.map(|frame| Ok(Event::default().data(frame_json(&frame))));

    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}
