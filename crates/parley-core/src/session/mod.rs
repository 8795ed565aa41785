//! Session storage: the store port, its in-memory implementation, and the
//! clock used for activity timestamps.

pub mod clock;
pub mod memory;
pub mod store;
