//! Conversation orchestration: one user turn from validation to reply.

pub mod retry;
pub mod service;

pub use retry::RetryPolicy;
pub use service::{ConversationService, SessionLookup, TurnOutcome, TurnSettings};
