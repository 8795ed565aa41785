//! ContextAssembler: fits a session's history into a size budget.
//!
//! The leading system message is always kept. The remaining budget is filled
//! with the newest messages, walking backwards, so the output is the system
//! message followed by a contiguous suffix of the history. The oldest
//! messages are dropped first.

use std::sync::Arc;

use tracing::debug;

use parley_types::config::ContextMeasure;
use parley_types::session::{Message, Session};

use super::measure::{CharCount, SizePolicy};

/// Builds the provider context for a session. Pure and deterministic.
#[derive(Debug, Clone)]
pub struct ContextAssembler {
    policy: Arc<dyn SizePolicy>,
}

impl Default for ContextAssembler {
    fn default() -> Self {
        Self::new(Arc::new(CharCount))
    }
}

impl ContextAssembler {
    pub fn new(policy: Arc<dyn SizePolicy>) -> Self {
        Self { policy }
    }

    pub fn from_measure(measure: ContextMeasure) -> Self {
        let policy: Box<dyn SizePolicy> = measure.into();
        Self::new(Arc::from(policy))
    }

    pub fn policy(&self) -> &dyn SizePolicy {
        self.policy.as_ref()
    }

    /// Size of one message under this assembler's policy.
    pub fn size_of(&self, message: &Message) -> usize {
        self.policy.measure(&message.content)
    }

    /// Total size of a list of messages.
    pub fn total_size(&self, messages: &[Message]) -> usize {
        messages
            .iter()
            .map(|m| self.size_of(m))
            .fold(0, usize::saturating_add)
    }

    /// Select the messages to send for `session` within `budget`.
    ///
    /// A non-empty session never yields an empty context: when the system
    /// message plus the newest message overflow the budget, the newest
    /// message alone is returned, truncated to fit.
    pub fn build(&self, session: &Session, budget: usize) -> Vec<Message> {
        let Some(newest) = session.messages.last() else {
            return Vec::new();
        };

        let system = session.system_message();
        let history = match system {
            Some(_) => &session.messages[1..],
            None => &session.messages[..],
        };

        if history.is_empty() {
            // Only the system message exists.
            return vec![self.fit(newest, budget)];
        }

        let system_size = system.map_or(0, |m| self.size_of(m));
        if system_size.saturating_add(self.size_of(newest)) > budget {
            debug!(
                session_id = %session.id,
                budget,
                "newest message exceeds context budget, truncating"
            );
            return vec![self.fit(newest, budget)];
        }

        let mut used = system_size;
        let mut start = history.len();
        for (idx, message) in history.iter().enumerate().rev() {
            let size = self.size_of(message);
            match used.checked_add(size) {
                Some(total) if total <= budget => {
                    used = total;
                    start = idx;
                }
                _ => break,
            }
        }

        let mut context = Vec::with_capacity(history.len() - start + 1);
        context.extend(system.cloned());
        context.extend_from_slice(&history[start..]);

        debug!(
            session_id = %session.id,
            kept = context.len(),
            dropped = start,
            used,
            budget,
            "context assembled"
        );
        context
    }

    fn fit(&self, message: &Message, budget: usize) -> Message {
        if self.size_of(message) <= budget {
            return message.clone();
        }
        Message {
            content: self.policy.truncate(&message.content, budget),
            ..message.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::measure::TokenEstimate;
    use chrono::Utc;
    use parley_types::session::{Metadata, MessageRole, SessionId};

    fn session(messages: &[(MessageRole, &str)]) -> Session {
        let now = Utc::now();
        let mut session = Session::new(SessionId::new(), Metadata::new(), now);
        session.messages = messages
            .iter()
            .map(|(role, content)| Message::new(*role, *content, now))
            .collect();
        session
    }

    fn contents(messages: &[Message]) -> Vec<&str> {
        messages.iter().map(|m| m.content.as_str()).collect()
    }

    #[test]
    fn empty_session_yields_empty_context() {
        let assembler = ContextAssembler::default();
        assert!(assembler.build(&session(&[]), 100).is_empty());
    }

    #[test]
    fn everything_fits() {
        let assembler = ContextAssembler::default();
        let s = session(&[
            (MessageRole::System, "sys"),
            (MessageRole::User, "hello"),
            (MessageRole::Assistant, "hi"),
        ]);
        let context = assembler.build(&s, 100);
        assert_eq!(context, s.messages);
    }

    #[test]
    fn drops_oldest_and_keeps_system() {
        let assembler = ContextAssembler::default();
        let s = session(&[
            (MessageRole::System, "sys"),     // 3
            (MessageRole::User, "aaaaaaaaaa"), // 10
            (MessageRole::Assistant, "bbbbb"), // 5
            (MessageRole::User, "ccccc"),      // 5
        ]);
        let context = assembler.build(&s, 14);
        assert_eq!(contents(&context), vec!["sys", "bbbbb", "ccccc"]);
        assert!(assembler.total_size(&context) <= 14);
    }

    #[test]
    fn suffix_is_contiguous() {
        let assembler = ContextAssembler::default();
        // The oldest message is tiny but must not be picked once a gap opens.
        let s = session(&[
            (MessageRole::User, "a"),
            (MessageRole::Assistant, "bbbbbbbbbb"),
            (MessageRole::User, "ccc"),
        ]);
        let context = assembler.build(&s, 5);
        assert_eq!(contents(&context), vec!["ccc"]);
    }

    #[test]
    fn without_system_message_only_suffix_is_kept() {
        let assembler = ContextAssembler::default();
        let s = session(&[
            (MessageRole::User, "one"),
            (MessageRole::Assistant, "two"),
            (MessageRole::User, "three"),
        ]);
        let context = assembler.build(&s, 8);
        assert_eq!(contents(&context), vec!["two", "three"]);
    }

    #[test]
    fn oversized_newest_is_truncated_alone() {
        let assembler = ContextAssembler::default();
        let s = session(&[
            (MessageRole::System, "system prompt"),
            (MessageRole::User, "older"),
            (MessageRole::User, "this message is far too long"),
        ]);
        let context = assembler.build(&s, 10);
        assert_eq!(context.len(), 1);
        assert_eq!(context[0].role, MessageRole::User);
        assert_eq!(context[0].content, "this messa");
    }

    #[test]
    fn system_only_session_is_kept_and_truncated() {
        let assembler = ContextAssembler::default();
        let s = session(&[(MessageRole::System, "abcdefgh")]);
        assert_eq!(contents(&assembler.build(&s, 100)), vec!["abcdefgh"]);
        assert_eq!(contents(&assembler.build(&s, 3)), vec!["abc"]);
    }

    #[test]
    fn budget_never_exceeded() {
        let s = session(&[
            (MessageRole::System, "you are a helpful assistant"),
            (MessageRole::User, "first question about something"),
            (MessageRole::Assistant, "a fairly long answer to the first question"),
            (MessageRole::User, "follow up"),
            (MessageRole::Assistant, "short"),
            (MessageRole::User, "and the latest question"),
        ]);
        for measure in [ContextMeasure::CharCount, ContextMeasure::TokenEstimate] {
            let assembler = ContextAssembler::from_measure(measure);
            for budget in 0..200 {
                let context = assembler.build(&s, budget);
                assert!(!context.is_empty());
                assert!(assembler.total_size(&context) <= budget, "budget {budget}");
                assert_eq!(context.last().map(|m| m.role), Some(MessageRole::User));
            }
        }
    }

    #[test]
    fn token_estimate_policy() {
        let assembler = ContextAssembler::new(Arc::new(TokenEstimate));
        let s = session(&[
            (MessageRole::User, "12345678"),  // 2 tokens
            (MessageRole::Assistant, "1234"), // 1 token
            (MessageRole::User, "12345"),     // 2 tokens
        ]);
        assert_eq!(contents(&assembler.build(&s, 3)), vec!["1234", "12345"]);
    }

    #[test]
    fn build_is_deterministic() {
        let assembler = ContextAssembler::default();
        let s = session(&[
            (MessageRole::System, "sys"),
            (MessageRole::User, "hello there"),
            (MessageRole::Assistant, "general kenobi"),
        ]);
        assert_eq!(assembler.build(&s, 20), assembler.build(&s, 20));
    }
}
