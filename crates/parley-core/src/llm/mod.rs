//! LLM provider abstraction.
//!
//! The conversation layer only sees [`provider::LlmProvider`] (static
//! dispatch) or [`box_provider::BoxLlmProvider`] (runtime selection).

pub mod box_provider;
pub mod provider;

#[cfg(any(test, feature = "testing"))]
pub mod testing;
