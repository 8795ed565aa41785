//! Application error type mapping to HTTP status codes and envelope format.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use parley_types::error::{ConversationError, TurnError};

use crate::http::handlers::new_request_id;
use crate::http::response::ApiResponse;

/// Application-level error that maps to HTTP responses.
#[derive(Debug)]
pub enum AppError {
    Conversation(ConversationError),
    /// Failed chat turn; carries the session the user message was stored in.
    Turn(TurnError),
    /// Malformed request (bad id, unparsable body).
    Validation(String),
}

impl From<ConversationError> for AppError {
    fn from(e: ConversationError) -> Self {
        AppError::Conversation(e)
    }
}

impl From<TurnError> for AppError {
    fn from(e: TurnError) -> Self {
        AppError::Turn(e)
    }
}

/// Non-standard "client closed request" status.
fn client_closed_request() -> StatusCode {
    StatusCode::from_u16(499).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

fn conversation_status(e: &ConversationError) -> StatusCode {
    match e {
        ConversationError::SessionNotFound(_) => StatusCode::NOT_FOUND,
        ConversationError::CapacityExceeded { .. } => StatusCode::SERVICE_UNAVAILABLE,
        ConversationError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        ConversationError::ProviderUnavailable(_) => StatusCode::BAD_GATEWAY,
        ConversationError::ProviderTimeout => StatusCode::GATEWAY_TIMEOUT,
        ConversationError::ProviderRateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
        ConversationError::Cancelled => client_closed_request(),
    }
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Conversation(e) => conversation_status(e),
            AppError::Turn(e) => conversation_status(&e.kind),
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::Conversation(e) => e.code(),
            AppError::Turn(e) => e.code(),
            AppError::Validation(_) => "VALIDATION_ERROR",
        }
    }

    /// Extra machine-readable context for the error entry.
    fn details(&self) -> Option<serde_json::Value> {
        match self {
            AppError::Turn(TurnError {
                session_id: Some(id),
                created,
                ..
            }) => Some(serde_json::json!({ "session_id": id, "created": created })),
            _ => None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let message = match &self {
            AppError::Conversation(e) => e.to_string(),
            AppError::Turn(e) => e.to_string(),
            AppError::Validation(msg) => msg.clone(),
        };

        if self.status().is_server_error() {
            tracing::warn!(code = self.code(), %message, "request failed");
        }

        let mut response =
            ApiResponse::error(self.status(), self.code(), &message, new_request_id(), 0);
        if let Some(details) = self.details() {
            response = response.with_details(details);
        }
        response.into_response()
    }
}
