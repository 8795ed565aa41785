//! Session management and conversation logic for Parley.
//!
//! Defines the ports (`SessionStore`, `LlmProvider`) and the services built
//! on them. Depends only on `parley-types`; concrete providers live in
//! `parley-infra`.

pub mod context;
pub mod conversation;
pub mod llm;
pub mod session;
pub mod sweeper;
