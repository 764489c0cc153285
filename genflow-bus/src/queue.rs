//! Per-recipient bounded message queue.

use genflow_types::AgentMessage;
use tokio::sync::Mutex;
use tokio::sync::mpsc;

use crate::history::History;

/// Default capacity of a per-recipient queue.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1_000;

/// A bounded mailbox for one registered agent, plus its own message history.
pub struct RecipientQueue {
    sender: mpsc::Sender<AgentMessage>,
    receiver: Mutex<mpsc::Receiver<AgentMessage>>,
    history: Mutex<History>,
}

impl RecipientQueue {
    /// Build a queue with [`DEFAULT_QUEUE_CAPACITY`].
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_QUEUE_CAPACITY)
    }

    /// Build a queue with a specific capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, receiver) = mpsc::channel(capacity);
        Self { sender, receiver: Mutex::new(receiver), history: Mutex::new(History::new()) }
    }

    /// Enqueue a message, recording it in this queue's history regardless of
    /// whether the bounded channel accepts it.
    pub async fn push(&self, message: AgentMessage) -> Result<(), mpsc::error::TrySendError<AgentMessage>> {
        self.history.lock().await.push(message.clone());
        self.sender.try_send(message)
    }

    /// Drain every currently available message, waiting up to `timeout` for
    /// the first one if the queue is empty.
    pub async fn drain(&self, timeout: std::time::Duration) -> Vec<AgentMessage> {
        let mut receiver = self.receiver.lock().await;
        let mut messages = Vec::new();

        match tokio::time::timeout(timeout, receiver.recv()).await {
            Ok(Some(message)) => messages.push(message),
            Ok(None) | Err(_) => return messages,
        }

        while let Ok(message) = receiver.try_recv() {
            messages.push(message);
        }
        messages
    }

    /// Number of messages currently buffered.
    pub fn len(&self) -> usize {
        self.sender.max_capacity() - self.sender.capacity()
    }

    /// Whether the queue currently holds no messages.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// This queue's own message history.
    pub async fn history(&self) -> tokio::sync::MutexGuard<'_, History> {
        self.history.lock().await
    }
}

impl Default for RecipientQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn push_then_drain_returns_the_message() {
        let queue = RecipientQueue::new();
        queue.push(AgentMessage::new("a", "b", "hi")).await.unwrap();
        let drained = queue.drain(Duration::from_millis(50)).await;
        assert_eq!(drained.len(), 1);
        assert_eq!(drained[0].content, "hi");
    }

    #[tokio::test]
    async fn drain_times_out_on_empty_queue() {
        let queue = RecipientQueue::new();
        let drained = queue.drain(Duration::from_millis(10)).await;
        assert!(drained.is_empty());
    }
}
