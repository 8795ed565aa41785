//! Logging and trace export for Parley.

pub mod tracing_setup;

pub use tracing_setup::{init_tracing, shutdown_tracing};
