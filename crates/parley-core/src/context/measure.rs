//! Size policies for the context budget.

use std::fmt;

use parley_types::config::ContextMeasure;

/// Characters per estimated token.
const CHARS_PER_TOKEN: usize = 4;

/// Measures message content against a budget and cuts it down to size.
///
/// `measure(&truncate(text, budget)) <= budget` must hold for every input.
pub trait SizePolicy: Send + Sync + fmt::Debug {
    fn measure(&self, text: &str) -> usize;

    /// Keep the head of `text` so that it measures at most `budget`.
    fn truncate(&self, text: &str, budget: usize) -> String;
}

/// Unicode scalar values.
#[derive(Debug, Clone, Copy, Default)]
pub struct CharCount;

impl SizePolicy for CharCount {
    fn measure(&self, text: &str) -> usize {
        text.chars().count()
    }

    fn truncate(&self, text: &str, budget: usize) -> String {
        text.chars().take(budget).collect()
    }
}

/// Rough token estimate: one token per four characters, rounded up.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokenEstimate;

impl SizePolicy for TokenEstimate {
    fn measure(&self, text: &str) -> usize {
        text.chars().count().div_ceil(CHARS_PER_TOKEN)
    }

    fn truncate(&self, text: &str, budget: usize) -> String {
        text.chars()
            .take(budget.saturating_mul(CHARS_PER_TOKEN))
            .collect()
    }
}

impl From<ContextMeasure> for Box<dyn SizePolicy> {
    fn from(measure: ContextMeasure) -> Self {
        match measure {
            ContextMeasure::CharCount => Box::new(CharCount),
            ContextMeasure::TokenEstimate => Box::new(TokenEstimate),
        }
    }
}
