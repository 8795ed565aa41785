//! Request handlers, one module per resource.

pub mod chat;
pub mod session;

use uuid::Uuid;

use parley_types::session::SessionId;

use crate::http::error::AppError;

/// Parse a session id from a path or body field, returning a 400 on bad format.
pub(crate) fn parse_session_id(s: &str) -> Result<SessionId, AppError> {
    s.parse::<Uuid>()
        .map(SessionId::from_uuid)
        .map_err(|_| AppError::Validation(format!("Invalid session id: {s}")))
}

/// Fresh id for the response envelope.
pub(crate) fn new_request_id() -> String {
    Uuid::now_v7().to_string()
}
