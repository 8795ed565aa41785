//! Infrastructure implementations for Parley.
//!
//! Concrete `LlmProvider`s for the ports defined in `parley-core`, plus the
//! `parley.toml` loader with environment overrides.

pub mod config;
pub mod llm;
