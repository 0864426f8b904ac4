//! HTTP API for document processing and question answering.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Status, version, uptime, loaded clause and session counts |
//! | `POST` | `/api/process-document` | Process agreement text into a session |
//! | `POST` | `/api/chat` | Ask a question against a session |
//! | `DELETE` | `/api/session/{id}` | Drop a session and its index |
//!
//! Each session owns its own vector index. `process-document` without a
//! `session_id` opens a new session and returns its id; later calls pass
//! the id back.
//!
//! Sessions live in memory. One idle for longer than
//! `[server].session_ttl_secs` is dropped, and opening a session past
//! `[server].max_sessions` evicts the least recently used one. A dropped
//! session answers 404.
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "question must not be empty" } }
//! ```
//!
//! Error codes: `bad_request` (400), `not_found` (404), `internal` (500).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted to support browser-based
//! clients.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};

use clauselens_core::CoreError;

use crate::config::Config;
use crate::session::{Answer, DocumentReport, Engine, ProcessOptions, Session};

type SessionHandle = Arc<tokio::sync::Mutex<Session>>;

struct SessionEntry {
    handle: SessionHandle,
    last_used: Instant,
}

/// Open sessions with idle expiry and a size cap.
///
/// Every method takes the current time so expiry is swept on access.
struct SessionTable {
    entries: HashMap<String, SessionEntry>,
    max_sessions: usize,
    ttl: Duration,
}

impl SessionTable {
    fn new(max_sessions: usize, ttl: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            max_sessions: max_sessions.max(1),
            ttl,
        }
    }

    fn sweep(&mut self, now: Instant) {
        let ttl = self.ttl;
        let before = self.entries.len();
        self.entries
            .retain(|_, e| now.saturating_duration_since(e.last_used) <= ttl);
        let expired = before - self.entries.len();
        if expired > 0 {
            tracing::info!(expired, "idle sessions dropped");
        }
    }

    fn get(&mut self, id: &str, now: Instant) -> Option<SessionHandle> {
        self.sweep(now);
        let entry = self.entries.get_mut(id)?;
        entry.last_used = now;
        Some(entry.handle.clone())
    }

    fn insert(&mut self, id: String, handle: SessionHandle, now: Instant) {
        self.sweep(now);
        while self.entries.len() >= self.max_sessions {
            let oldest = self
                .entries
                .iter()
                .min_by_key(|(_, e)| e.last_used)
                .map(|(id, _)| id.clone());
            match oldest {
                Some(oldest) => {
                    tracing::info!(session = %oldest, "session evicted");
                    self.entries.remove(&oldest);
                }
                None => break,
            }
        }
        self.entries.insert(
            id,
            SessionEntry {
                handle,
                last_used: now,
            },
        );
    }

    fn remove(&mut self, id: &str) -> bool {
        self.entries.remove(id).is_some()
    }

    fn len(&mut self, now: Instant) -> usize {
        self.sweep(now);
        self.entries.len()
    }
}

/// Shared application state passed to all route handlers via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    engine: Arc<Engine>,
    sessions: Arc<Mutex<SessionTable>>,
    started: Instant,
}

impl AppState {
    /// Session limits come from the engine's `[server]` config.
    pub fn new(engine: Arc<Engine>) -> Self {
        let server = &engine.config().server;
        let table = SessionTable::new(
            server.max_sessions,
            Duration::from_secs(server.session_ttl_secs),
        );
        Self {
            engine,
            sessions: Arc::new(Mutex::new(table)),
            started: Instant::now(),
        }
    }

    fn table(&self) -> Result<std::sync::MutexGuard<'_, SessionTable>, AppError> {
        self.sessions
            .lock()
            .map_err(|_| internal("session table poisoned"))
    }

    fn session(&self, id: &str) -> Result<SessionHandle, AppError> {
        self.table()?
            .get(id, Instant::now())
            .ok_or_else(|| not_found(format!("unknown session: {}", id)))
    }

    fn open_session(&self) -> Result<(String, SessionHandle), AppError> {
        let id = uuid::Uuid::new_v4().to_string();
        let handle: SessionHandle = Arc::new(tokio::sync::Mutex::new(Session::new()));
        self.table()?
            .insert(id.clone(), handle.clone(), Instant::now());
        Ok((id, handle))
    }

    fn close_session(&self, id: &str) -> Result<(), AppError> {
        if self.table()?.remove(id) {
            Ok(())
        } else {
            Err(not_found(format!("unknown session: {}", id)))
        }
    }

    fn session_count(&self) -> usize {
        self.sessions
            .lock()
            .map(|mut t| t.len(Instant::now()))
            .unwrap_or(0)
    }
}

/// The application router, without a listener.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/api/process-document", post(handle_process))
        .route("/api/chat", post(handle_chat))
        .route("/api/session/{id}", delete(handle_delete_session))
        .layer(cors)
        .with_state(state)
}

/// Starts the HTTP server.
///
/// Embeds the reference clauses, binds to `[server].bind`, and serves
/// until Ctrl-C.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();
    let engine = Engine::start(config.clone()).await?;
    if let Some(reason) = engine.degraded() {
        eprintln!("Warning: coverage checks disabled ({})", reason);
    }
    let app = router(AppState::new(Arc::new(engine)));

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    println!("Server listening on http://{}", bind_addr);
    tracing::info!(bind = %bind_addr, "server started");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    tracing::info!("server stopped");
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
    code: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code.to_string(),
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request",
        message: message.into(),
    }
}

fn not_found(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        code: "not_found",
        message: message.into(),
    }
}

fn internal(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal",
        message: message.into(),
    }
}

/// Caller mistakes become 400, everything else 500.
impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        let message = format!("{:#}", err);
        match err.downcast_ref::<CoreError>() {
            Some(CoreError::InvalidInput(_)) => bad_request(message),
            _ => {
                tracing::error!(error = %message, "request failed");
                internal(message)
            }
        }
    }
}

// ============ GET /health ============

#[derive(Serialize, Deserialize)]
pub struct HealthResponse {
    /// `"ok"`, or `"degraded"` when coverage checks cannot run.
    pub status: String,
    /// Why the service is degraded, if it is.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub version: String,
    pub uptime_secs: u64,
    pub reference_clauses: usize,
    pub sessions: usize,
}

async fn handle_health(State(state): State<AppState>) -> Json<HealthResponse> {
    let clauses = state.engine.references().len();
    let reason = match state.engine.degraded() {
        Some(reason) => Some(reason.to_string()),
        None if clauses == 0 => Some("no reference clauses loaded".to_string()),
        None => None,
    };
    Json(HealthResponse {
        status: if reason.is_none() { "ok" } else { "degraded" }.to_string(),
        reason,
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.started.elapsed().as_secs(),
        reference_clauses: clauses,
        sessions: state.session_count(),
    })
}

// ============ POST /api/process-document ============

#[derive(Deserialize)]
pub struct ProcessRequest {
    pub text: String,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default = "default_summarize")]
    pub summarize: bool,
}

fn default_summarize() -> bool {
    true
}

#[derive(Serialize)]
pub struct ProcessResponse {
    pub session_id: String,
    #[serde(flatten)]
    pub report: DocumentReport,
}

async fn handle_process(
    State(state): State<AppState>,
    Json(req): Json<ProcessRequest>,
) -> Result<Json<ProcessResponse>, AppError> {
    if req.text.trim().is_empty() {
        return Err(bad_request("text must not be empty"));
    }
    let (session_id, handle) = match req.session_id {
        Some(id) => {
            let handle = state.session(&id)?;
            (id, handle)
        }
        None => state.open_session()?,
    };

    let mut session = handle.lock().await;
    let report = state
        .engine
        .process_document(
            &mut session,
            &req.text,
            ProcessOptions {
                summarize: req.summarize,
            },
        )
        .await?;

    Ok(Json(ProcessResponse { session_id, report }))
}

// ============ POST /api/chat ============

#[derive(Deserialize)]
pub struct ChatRequest {
    pub session_id: String,
    pub query: String,
}

#[derive(Serialize)]
pub struct ChatResponse {
    pub session_id: String,
    #[serde(flatten)]
    pub answer: Answer,
}

async fn handle_chat(
    State(state): State<AppState>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, AppError> {
    if req.query.trim().is_empty() {
        return Err(bad_request("Query cannot be empty."));
    }
    let handle = state.session(&req.session_id)?;
    let session = handle.lock().await;
    let answer = state.engine.answer(&session, &req.query).await?;
    Ok(Json(ChatResponse {
        session_id: req.session_id,
        answer,
    }))
}

// ============ DELETE /api/session/{id} ============

async fn handle_delete_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    state.close_session(&id)?;
    Ok(StatusCode::NO_CONTENT)
}
