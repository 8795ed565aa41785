//! Parley application layer: HTTP API, CLI definitions, and state wiring.
//!
//! The `parley` binary in `main.rs` is a thin dispatcher over this library,
//! which lets integration tests drive the router in-process.

pub mod cli;
pub mod http;
pub mod state;
