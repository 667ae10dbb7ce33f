//! Tutor HTTP API
//!
//! Axum server for students (chat, answer submission) and teachers (review,
//! semaphore dashboard, live events).
//!
//! Architecture: each endpoint has a thin axum handler that delegates to an
//! inner function returning `(StatusCode, Value)`. The inner functions are
//! directly testable without axum dispatch machinery.
//!
//! Endpoints:
//! - GET  /health                       — health check with storage status
//! - GET  /version                      — server version info
//! - POST /chat                         — tutor reply, classification in background
//! - POST /answers                      — submit an answer, grading in background
//! - GET  /answers/pending              — answers awaiting teacher review
//! - POST /answers/:id/review           — approve or edit a grade
//! - GET  /students/status              — newest color per student
//! - GET  /students/:identity/status    — newest color for one student
//! - GET  /events                       — server-sent status events

use std::convert::Infallible;
use std::sync::Arc;

use anyhow::Result;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use futures::stream::Stream;
use serde::Serialize;
use serde_json::{json, Value};
use sqlx::PgPool;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, watch};
use tutor_core::{EventKind, StatusEvent, TeacherAction};
use uuid::Uuid;

use crate::services::TutorServices;
use crate::subsystems::pipeline::{self, AnswerRequest, ChatRequest, PipelineError};
use crate::subsystems::review::ReviewError;

/// Shared state for all HTTP handlers
pub struct HttpState {
    pub services: TutorServices,
    /// Present when the store is PostgreSQL; used by the health check.
    pub pool: Option<PgPool>,
    closing: watch::Sender<bool>,
}

impl HttpState {
    pub fn new(services: TutorServices, pool: Option<PgPool>) -> Self {
        let (closing, _) = watch::channel(false);
        Self {
            services,
            pool,
            closing,
        }
    }

    /// End every open event stream.
    pub fn close_streams(&self) {
        self.closing.send_replace(true);
    }
}

/// Build the Axum router with all endpoints
pub fn build_router(state: Arc<HttpState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/version", get(version_handler))
        .route("/chat", post(chat_handler))
        .route("/answers", post(answer_handler))
        .route("/answers/pending", get(pending_handler))
        .route("/answers/:id/review", post(review_handler))
        .route("/students/status", get(statuses_handler))
        .route("/students/:identity/status", get(student_status_handler))
        .route("/events", get(events_handler))
        .with_state(state)
}

/// Start the HTTP server on the configured address.
/// Gracefully shuts down when the broadcast shutdown signal fires.
pub async fn start_http_server(
    services: TutorServices,
    pool: Option<PgPool>,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<()> {
    let addr = format!(
        "{}:{}",
        services.config.http.host, services.config.http.port
    );
    let state = Arc::new(HttpState::new(services, pool));

    let app = build_router(state.clone());
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Tutor HTTP API listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
            tracing::info!("HTTP server shutting down...");
            state.close_streams();
        })
        .await?;

    Ok(())
}

// ============================================================================
// Response DTOs
// ============================================================================

/// Standard HTTP error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub status: String,
}

impl ErrorResponse {
    pub fn new(msg: impl Into<String>) -> Self {
        Self {
            error: msg.into(),
            status: "error".to_string(),
        }
    }
}

fn error_body(status: StatusCode, msg: impl Into<String>) -> (StatusCode, Value) {
    let body = serde_json::to_value(ErrorResponse::new(msg)).unwrap_or_else(|_| json!({}));
    (status, body)
}

fn pipeline_error(e: PipelineError) -> (StatusCode, Value) {
    match e {
        PipelineError::Invalid(msg) => error_body(StatusCode::BAD_REQUEST, msg),
        PipelineError::Store(e) => {
            tracing::error!(error = %e, "Store failure while handling request");
            error_body(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

// ============================================================================
// Inner (directly testable) business logic functions
// ============================================================================

/// Inner health check — queries the DB when there is one.
pub async fn health_inner(state: &HttpState) -> (StatusCode, Value) {
    let subscribers = state.services.notifier.subscriber_count();

    let Some(pool) = &state.pool else {
        return (
            StatusCode::OK,
            json!({
                "status": "healthy",
                "version": env!("CARGO_PKG_VERSION"),
                "storage": "memory",
                "subscribers": subscribers,
            }),
        );
    };

    match tutor_core::db::health_check(pool).await {
        Ok(pg_ver) => (
            StatusCode::OK,
            json!({
                "status": "healthy",
                "version": env!("CARGO_PKG_VERSION"),
                "storage": "postgresql",
                "postgresql": pg_ver,
                "subscribers": subscribers,
            }),
        ),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            json!({
                "status": "unhealthy",
                "error": e.to_string(),
            }),
        ),
    }
}

/// Inner version — returns version info (pure, no IO).
pub fn version_inner() -> Value {
    json!({
        "version": env!("CARGO_PKG_VERSION"),
        "protocol": "tutor/1",
    })
}

/// Inner chat — replies now, classifies in the background.
pub async fn chat_inner(services: &TutorServices, req: ChatRequest) -> (StatusCode, Value) {
    match pipeline::handle_chat(services, req).await {
        Ok(accepted) => (
            StatusCode::OK,
            json!({
                "chat_id": accepted.entry.id,
                "reply": accepted.entry.reply,
                "status": "processing",
            }),
        ),
        Err(e) => pipeline_error(e),
    }
}

/// Inner answer submission — stores the answer, grades in the background.
pub async fn answer_inner(services: &TutorServices, req: AnswerRequest) -> (StatusCode, Value) {
    match pipeline::submit_answer(services, req).await {
        Ok(accepted) => (
            StatusCode::ACCEPTED,
            json!({
                "answer_id": accepted.answer.id,
                "status": "processing",
            }),
        ),
        Err(e) => pipeline_error(e),
    }
}

pub async fn pending_inner(services: &TutorServices) -> (StatusCode, Value) {
    match services.store.pending_answers().await {
        Ok(answers) => (
            StatusCode::OK,
            json!({
                "count": answers.len(),
                "answers": answers,
            }),
        ),
        Err(e) => error_body(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

pub async fn review_inner(
    services: &TutorServices,
    id: Uuid,
    action: TeacherAction,
) -> (StatusCode, Value) {
    match pipeline::review(services, id, action).await {
        Ok(answer) => (StatusCode::OK, json!({ "answer": answer })),
        Err(e) => {
            let status = match &e {
                ReviewError::NotFound(_) => StatusCode::NOT_FOUND,
                ReviewError::AlreadyReviewed { .. } | ReviewError::NotGraded(_) => {
                    StatusCode::CONFLICT
                }
                ReviewError::InvalidScore(_) => StatusCode::BAD_REQUEST,
                ReviewError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            };
            error_body(status, e.to_string())
        }
    }
}

pub async fn statuses_inner(services: &TutorServices) -> (StatusCode, Value) {
    match services.store.student_statuses().await {
        Ok(students) => (
            StatusCode::OK,
            json!({
                "count": students.len(),
                "students": students,
            }),
        ),
        Err(e) => error_body(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

pub async fn student_status_inner(services: &TutorServices, identity: &str) -> (StatusCode, Value) {
    match pipeline::current_color(services, identity).await {
        Ok(color) => (
            StatusCode::OK,
            json!({
                "identity": identity,
                "color": color,
            }),
        ),
        Err(e) => error_body(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

/// SSE frames for every status event until the receiver closes or the
/// server starts shutting down. Lagging subscribers skip what they missed.
pub fn event_stream(
    rx: broadcast::Receiver<StatusEvent>,
    closing: watch::Receiver<bool>,
) -> impl Stream<Item = Result<Event, Infallible>> {
    futures::stream::unfold((rx, closing), |(mut rx, mut closing)| async move {
        loop {
            tokio::select! {
                _ = async {
                    let _ = closing.wait_for(|closed| *closed).await;
                } => return None,
                received = rx.recv() => match received {
                    Ok(event) => {
                        let kind = match event.kind {
                            EventKind::Chat => "chat",
                            EventKind::Answer => "answer",
                        };
                        match Event::default().event(kind).json_data(&event) {
                            Ok(frame) => return Some((Ok(frame), (rx, closing))),
                            Err(e) => {
                                tracing::warn!(error = %e, "Failed to encode status event");
                            }
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "Event subscriber lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => return None,
                },
            }
        }
    })
}

// ============================================================================
// Axum handler wrappers (thin — delegate to inner functions)
// ============================================================================

pub async fn health_handler(State(state): State<Arc<HttpState>>) -> impl IntoResponse {
    let (status, body) = health_inner(&state).await;
    (status, Json(body))
}

pub async fn version_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(version_inner()))
}

pub async fn chat_handler(
    State(state): State<Arc<HttpState>>,
    Json(req): Json<ChatRequest>,
) -> impl IntoResponse {
    let (status, body) = chat_inner(&state.services, req).await;
    (status, Json(body))
}

pub async fn answer_handler(
    State(state): State<Arc<HttpState>>,
    Json(req): Json<AnswerRequest>,
) -> impl IntoResponse {
    let (status, body) = answer_inner(&state.services, req).await;
    (status, Json(body))
}

pub async fn pending_handler(State(state): State<Arc<HttpState>>) -> impl IntoResponse {
    let (status, body) = pending_inner(&state.services).await;
    (status, Json(body))
}

pub async fn review_handler(
    State(state): State<Arc<HttpState>>,
    Path(id): Path<Uuid>,
    Json(action): Json<TeacherAction>,
) -> impl IntoResponse {
    let (status, body) = review_inner(&state.services, id, action).await;
    (status, Json(body))
}

pub async fn statuses_handler(State(state): State<Arc<HttpState>>) -> impl IntoResponse {
    let (status, body) = statuses_inner(&state.services).await;
    (status, Json(body))
}

pub async fn student_status_handler(
    State(state): State<Arc<HttpState>>,
    Path(identity): Path<String>,
) -> impl IntoResponse {
    let (status, body) = student_status_inner(&state.services, &identity).await;
    (status, Json(body))
}

pub async fn events_handler(State(state): State<Arc<HttpState>>) -> impl IntoResponse {
    let stream = event_stream(
        state.services.notifier.subscribe(),
        state.closing.subscribe(),
    );
    Sse::new(stream).keep_alive(KeepAlive::default())
}

// ============================================================================
// Unit Tests — call inner functions directly
// ============================================================================
