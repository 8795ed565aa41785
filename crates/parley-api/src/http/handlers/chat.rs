//! Chat HTTP handler.
//!
//! Endpoint:
//! - POST /api/v1/chat/message - Run one conversation turn

use std::time::Instant;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use parley_types::session::SessionId;

use super::{new_request_id, parse_session_id};
use crate::http::error::AppError;
use crate::http::response::ApiResponse;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    /// Continue this session; a missing or unknown id starts a new one.
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub session_id: SessionId,
    pub response: String,
    pub message_count: usize,
    /// Whether this turn started a new session.
    pub created: bool,
}

/// POST /api/v1/chat/message - Send a user message and get the reply.
pub async fn send_message(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<ApiResponse<ChatResponse>, AppError> {
    let start = Instant::now();
    let request_id = new_request_id();

    let Json(body) = payload.map_err(|e| AppError::Validation(e.body_text()))?;
    let session_id = body
        .session_id
        .as_deref()
        .filter(|s| !s.is_empty())
        .map(parse_session_id)
        .transpose()?;

    let outcome = state
        .conversation
        .handle_turn_cancellable(session_id, &body.message, state.shutdown.child_token())
        .await?;

    let elapsed = start.elapsed().as_millis() as u64;
    let self_link = format!("/api/v1/sessions/{}", outcome.session_id);

    Ok(ApiResponse::success(
        ChatResponse {
            session_id: outcome.session_id,
            response: outcome.reply,
            message_count: outcome.message_count,
            created: outcome.created,
        },
        request_id,
        elapsed,
    )
    .with_link("session", &self_link))
}
