//! Subscription handler table.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use genflow_types::{AgentMessage, AgentResult, MessageFilter};

/// A subscribed callback, invoked for every message matching its filter.
pub type HandlerFn = Arc<dyn Fn(AgentMessage) -> Pin<Box<dyn Future<Output = Result<AgentResult, String>> + Send>> + Send + Sync>;

/// One entry in the bus's handler table.
pub struct MessageHandler {
    /// Unique id, returned by `subscribe` and accepted by `unsubscribe`.
    pub id: String,
    /// Predicate controlling which messages this handler receives.
    pub filter: MessageFilter,
    /// The callback itself.
    pub callback: HandlerFn,
}

impl MessageHandler {
    /// Whether `message` satisfies this handler's filter.
    pub fn matches(&self, message: &AgentMessage) -> bool {
        self.filter.matches(message)
    }
}
