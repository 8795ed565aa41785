//! Shared domain types for Parley.
//!
//! This crate contains the core domain types used across the Parley backend:
//! sessions, messages, LLM request/response shapes, configuration, and their
//! associated error types.
//!
//! Zero infrastructure dependencies -- only serde, uuid, chrono, thiserror.

pub mod config;
pub mod error;
pub mod llm;
pub mod session;
