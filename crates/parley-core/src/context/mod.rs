//! Context assembly: choosing which messages of a session go to the provider.

pub mod assembler;
pub mod measure;

pub use assembler::ContextAssembler;
pub use measure::{CharCount, SizePolicy, TokenEstimate};
