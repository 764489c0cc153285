//! Bounded message history, queried with the same [`MessageFilter`] used for
//! live subscriptions.

use std::collections::VecDeque;

use genflow_types::{AgentMessage, MessageFilter};

/// Maximum messages retained before the history is trimmed back to half its
/// capacity.
pub const MAX_HISTORY: usize = 10_000;

/// A ring-buffer-like append log of messages, trimmed once it exceeds
/// [`MAX_HISTORY`].
#[derive(Default)]
pub struct History {
    messages: VecDeque<AgentMessage>,
}

impl History {
    /// Build an empty history.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message, trimming to the newest half of [`MAX_HISTORY`] if
    /// the log has grown past it.
    pub fn push(&mut self, message: AgentMessage) {
        self.messages.push_back(message);
        if self.messages.len() > MAX_HISTORY {
            let drop_count = self.messages.len() - MAX_HISTORY / 2;
            self.messages.drain(..drop_count);
        }
    }

    /// The most recent `limit` messages, optionally filtered.
    pub fn recent(&self, limit: usize, filter: Option<&MessageFilter>) -> Vec<AgentMessage> {
        let tail = self.messages.iter().rev().take(limit).rev();
        match filter {
            Some(filter) => tail.filter(|m| filter.matches(m)).cloned().collect(),
            None => tail.cloned().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recent_respects_limit_and_order() {
        let mut history = History::new();
        for i in 0..5 {
            history.push(AgentMessage::new("s", "r", i.to_string()));
        }
        let recent = history.recent(2, None);
        assert_eq!(recent.iter().map(|m| m.content.as_str()).collect::<Vec<_>>(), vec!["3", "4"]);
    }

    #[test]
    fn recent_applies_filter() {
        let mut history = History::new();
        history.push(AgentMessage::new("a", "r", "1"));
        history.push(AgentMessage::new("b", "r", "2"));

        let mut filter = MessageFilter::any();
        filter.sender = Some("b".into());
        let recent = history.recent(10, Some(&filter));
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].content, "2");
    }

    #[test]
    fn trims_to_half_capacity_once_over_the_limit() {
        let mut history = History::new();
        for i in 0..(MAX_HISTORY + 1) {
            history.push(AgentMessage::new("s", "r", i.to_string()));
        }
        assert!(history.messages.len() <= MAX_HISTORY);
        assert!(history.messages.len() >= MAX_HISTORY / 2);
    }
}
