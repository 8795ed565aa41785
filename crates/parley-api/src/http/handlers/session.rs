//! Session HTTP handlers.
//!
//! Endpoints:
//! - POST   /api/v1/sessions               - Create an empty session
//! - GET    /api/v1/sessions               - List live sessions
//! - GET    /api/v1/sessions/{id}          - Get a session with its history
//! - PATCH  /api/v1/sessions/{id}/metadata - Set one metadata key
//! - DELETE /api/v1/sessions/{id}          - Delete a session (idempotent)

use std::time::Instant;

use axum::body::Bytes;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use parley_types::session::{Message, Metadata, MetadataValue, Session, SessionId, SessionSummary};

use super::{new_request_id, parse_session_id};
use crate::http::error::AppError;
use crate::http::response::ApiResponse;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct CreateSessionRequest {
    #[serde(default)]
    pub metadata: Metadata,
}

#[derive(Debug, Deserialize)]
pub struct UpdateMetadataRequest {
    pub key: String,
    pub value: MetadataValue,
}

/// Full session as returned by the API.
#[derive(Debug, Serialize)]
pub struct SessionView {
    pub session_id: SessionId,
    pub created_at: DateTime<Utc>,
    pub last_active_at: DateTime<Utc>,
    pub message_count: usize,
    pub metadata: Metadata,
    pub messages: Vec<Message>,
}

impl From<Session> for SessionView {
    fn from(session: Session) -> Self {
        Self {
            session_id: session.id,
            created_at: session.created_at,
            last_active_at: session.last_active_at,
            message_count: session.messages.len(),
            metadata: session.metadata,
            messages: session.messages,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DeleteResult {
    pub deleted: bool,
    pub session_id: SessionId,
}

fn session_link(id: &SessionId) -> String {
    format!("/api/v1/sessions/{id}")
}

/// POST /api/v1/sessions - Create a session, optionally with metadata.
///
/// The body is optional; an empty body creates a session without metadata.
pub async fn create_session(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<ApiResponse<SessionView>, AppError> {
    let start = Instant::now();
    let request_id = new_request_id();

    let request: CreateSessionRequest = if body.iter().all(u8::is_ascii_whitespace) {
        CreateSessionRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| AppError::Validation(format!("Invalid request body: {e}")))?
    };

    let session = state.conversation.create_session(request.metadata).await?;
    let link = session_link(&session.id);

    let elapsed = start.elapsed().as_millis() as u64;
    Ok(ApiResponse::created(SessionView::from(session), request_id, elapsed).with_link("self", &link))
}

/// GET /api/v1/sessions - Summaries of all live sessions, oldest first.
pub async fn list_sessions(
    State(state): State<AppState>,
) -> Result<ApiResponse<Vec<SessionSummary>>, AppError> {
    let start = Instant::now();
    let request_id = new_request_id();

    let sessions = state.conversation.list_sessions().await?;

    let elapsed = start.elapsed().as_millis() as u64;
    Ok(ApiResponse::success(sessions, request_id, elapsed).with_link("self", "/api/v1/sessions"))
}

/// GET /api/v1/sessions/{id} - One session with its full message history.
pub async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<ApiResponse<SessionView>, AppError> {
    let start = Instant::now();
    let request_id = new_request_id();
    let session_id = parse_session_id(&id)?;

    let session = state.conversation.get_session(&session_id).await?;

    let elapsed = start.elapsed().as_millis() as u64;
    Ok(ApiResponse::success(SessionView::from(session), request_id, elapsed)
        .with_link("self", &session_link(&session_id)))
}

/// PATCH /api/v1/sessions/{id}/metadata - Set one metadata key.
pub async fn update_metadata(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<UpdateMetadataRequest>, JsonRejection>,
) -> Result<ApiResponse<SessionView>, AppError> {
    let start = Instant::now();
    let request_id = new_request_id();
    let session_id = parse_session_id(&id)?;
    let Json(body) = payload.map_err(|e| AppError::Validation(e.body_text()))?;

    let session = state
        .conversation
        .update_metadata(&session_id, body.key, body.value)
        .await?;

    let elapsed = start.elapsed().as_millis() as u64;
    Ok(ApiResponse::success(SessionView::from(session), request_id, elapsed)
        .with_link("session", &session_link(&session_id)))
}

/// DELETE /api/v1/sessions/{id} - Delete a session.
///
/// Always 200; `deleted` tells whether anything was removed.
pub async fn delete_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<ApiResponse<DeleteResult>, AppError> {
    let start = Instant::now();
    let request_id = new_request_id();
    let session_id = parse_session_id(&id)?;

    let deleted = state.conversation.delete_session(&session_id).await?;

    let elapsed = start.elapsed().as_millis() as u64;
    Ok(ApiResponse::success(
        DeleteResult {
            deleted,
            session_id,
        },
        request_id,
        elapsed,
    ))
}
