//! JSON HTTP chat server.
//!
//! Exposes the load/ask/history/clear/export session operations over HTTP
//! for browser-based chat frontends. One [`SessionContext`] lives behind a
//! mutex for the whole process — the deployment model is one operator per
//! process, and the lock serializes question handling, so a second
//! question waits until the in-flight retrieve-then-generate round trip
//! completes.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Health check (returns version) |
//! | `POST` | `/api/load` | Ingest a PDF by path or base64 upload; replaces the session document |
//! | `POST` | `/api/ask` | Answer a question with source citations |
//! | `GET`  | `/api/history` | Chat history for the session |
//! | `POST` | `/api/clear` | Clear chat history (document stays loaded) |
//! | `GET`  | `/api/export` | Plain-text transcript |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "no_document", "message": "No document loaded. Load a document first." } }
//! ```
//!
//! Error codes: `bad_request` (400), `no_document` (409), `load_failed` (400).

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use base64::Engine;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tower_http::cors::{Any, CorsLayer};

use crate::chat::{self, SessionContext};
use crate::config::Config;
use crate::ingest;
use crate::models::{ChatMessage, SourceRef};
use crate::store;

/// Shared application state handed to every route handler.
#[derive(Clone)]
struct AppState {
    config: Arc<Config>,
    pool: SqlitePool,
    session: Arc<Mutex<SessionContext>>,
}

/// Start the chat server on the configured bind address. If the index
/// already contains a document, the session starts out Ready over it.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();
    let pool = store::connect(config).await?;

    let mut session = SessionContext::new();
    if store::count_vectors(&pool).await? > 0 {
        if let Some(source) = store::indexed_sources(&pool).await?.into_iter().next() {
            session.finish_load(source);
        }
    }

    let state = AppState {
        config: Arc::new(config.clone()),
        pool,
        session: Arc::new(Mutex::new(session)),
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/health", get(handle_health))
        .route("/api/load", post(handle_load))
        .route("/api/ask", post(handle_ask))
        .route("/api/history", get(handle_history))
        .route("/api/clear", post(handle_clear))
        .route("/api/export", get(handle_export))
        .layer(cors)
        .with_state(state);

    println!("docchat server listening on http://{}", bind_addr);

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

fn bad_request(code: &str, message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: code.to_string(),
        message: message.into(),
    }
}

fn no_document(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::CONFLICT,
        code: "no_document".to_string(),
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

// ============ POST /api/load ============

#[derive(Deserialize)]
struct LoadRequest {
    /// Path to a PDF on the server's filesystem.
    #[serde(default)]
    path: Option<PathBuf>,
    /// Alternative: upload a PDF inline.
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    content_base64: Option<String>,
}

#[derive(Serialize)]
struct LoadResponse {
    source: String,
    text_items: usize,
    table_items: usize,
    image_items: usize,
    chunks: u64,
    embedded: u64,
}

async fn handle_load(
    State(state): State<AppState>,
    Json(req): Json<LoadRequest>,
) -> Result<Json<LoadResponse>, AppError> {
    let pdf_path = resolve_load_path(&state.config, &req)?;

    // Hold the session lock across the whole load so questions queue
    // behind it rather than racing a half-replaced index.
    let mut session = state.session.lock().await;
    session.begin_load();

    match ingest::ingest_document(&state.config, &pdf_path, false).await {
        Ok(summary) => {
            session.finish_load(summary.source.clone());
            Ok(Json(LoadResponse {
                source: summary.source,
                text_items: summary.text_items,
                table_items: summary.table_items,
                image_items: summary.image_items,
                chunks: summary.chunks,
                embedded: summary.embedded,
            }))
        }
        Err(e) => {
            session.fail_load();
            Err(bad_request("load_failed", e.to_string()))
        }
    }
}

/// Work out which file to ingest: a server-side path, or an uploaded
/// base64 body written under the artifacts directory.
fn resolve_load_path(config: &Config, req: &LoadRequest) -> Result<PathBuf, AppError> {
    if let Some(path) = &req.path {
        return Ok(path.clone());
    }

    let (name, content) = match (&req.name, &req.content_base64) {
        (Some(name), Some(content)) => (name, content),
        _ => {
            return Err(bad_request(
                "bad_request",
                "provide either path, or name and content_base64",
            ))
        }
    };

    let bytes = base64::engine::general_purpose::STANDARD
        .decode(content)
        .map_err(|e| bad_request("bad_request", format!("invalid base64 content: {}", e)))?;

    let uploads_dir = config.extraction.artifacts_dir.join("uploads");
    std::fs::create_dir_all(&uploads_dir)
        .map_err(|e| bad_request("load_failed", format!("cannot create uploads dir: {}", e)))?;

    // Keep only the file name; an uploaded name must not escape the dir.
    let file_name = std::path::Path::new(name)
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .filter(|n| !n.is_empty())
        .ok_or_else(|| bad_request("bad_request", "invalid upload name"))?;

    let path = uploads_dir.join(file_name);
    std::fs::write(&path, bytes)
        .map_err(|e| bad_request("load_failed", format!("cannot write upload: {}", e)))?;

    Ok(path)
}

// ============ POST /api/ask ============

#[derive(Deserialize)]
struct AskRequest {
    question: String,
}

#[derive(Serialize)]
struct AskResponse {
    answer: String,
    sources: Vec<SourceRef>,
}

async fn handle_ask(
    State(state): State<AppState>,
    Json(req): Json<AskRequest>,
) -> Result<Json<AskResponse>, AppError> {
    if req.question.trim().is_empty() {
        return Err(bad_request("bad_request", "question must not be empty"));
    }

    let mut session = state.session.lock().await;
    session
        .begin_question()
        .map_err(|e| no_document(e.to_string()))?;

    let (answer, sources) = chat::answer_question(&state.pool, &state.config, &req.question).await;
    session.finish_question(&req.question, answer.clone(), sources.clone());

    Ok(Json(AskResponse { answer, sources }))
}

// ============ GET /api/history ============

#[derive(Serialize)]
struct HistoryResponse {
    source: Option<String>,
    messages: Vec<ChatMessage>,
}

async fn handle_history(State(state): State<AppState>) -> Json<HistoryResponse> {
    let session = state.session.lock().await;
    Json(HistoryResponse {
        source: session.source().map(str::to_string),
        messages: session.messages().to_vec(),
    })
}

// ============ POST /api/clear ============

async fn handle_clear(State(state): State<AppState>) -> Json<serde_json::Value> {
    let mut session = state.session.lock().await;
    session.clear();
    Json(serde_json::json!({ "cleared": true }))
}

// ============ GET /api/export ============

async fn handle_export(State(state): State<AppState>) -> Response {
    let session = state.session.lock().await;
    let transcript = session.export_transcript();
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        transcript,
    )
        .into_response()
}
