//! Lifecycle and message-handler table wrapped around an [`Agent`].

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use genflow_types::{AgentMessage, AgentResult};
use tokio::sync::RwLock;

use crate::agent::Agent;

/// A message handler: invoked with the message, returns an optional result.
pub type MessageHandler = Arc<dyn Fn(AgentMessage) -> Pin<Box<dyn Future<Output = AgentResult> + Send>> + Send + Sync>;

/// Wraps an [`Agent`] with the running-flag lifecycle and the
/// `message_type -> handler` table used for subscription-style message
/// processing. The owning message bus looks up the matching handler (by the
/// incoming message's `message_type`) and invokes it when delivering a
/// message destined for this agent.
pub struct AgentRuntime {
    agent: Arc<dyn Agent>,
    running: AtomicBool,
    handlers: RwLock<HashMap<String, MessageHandler>>,
}

impl AgentRuntime {
    /// Wrap `agent`, initially stopped with no registered handlers.
    pub fn new(agent: Arc<dyn Agent>) -> Self {
        Self { agent, running: AtomicBool::new(false), handlers: RwLock::new(HashMap::new()) }
    }

    /// This agent's id.
    pub fn id(&self) -> &str {
        self.agent.id()
    }

    /// The wrapped agent, for direct task dispatch.
    pub fn agent(&self) -> &Arc<dyn Agent> {
        &self.agent
    }

    /// Mark the agent running.
    pub fn start(&self) {
        self.running.store(true, Ordering::SeqCst);
        tracing::info!(agent = self.id(), "started agent");
    }

    /// Mark the agent stopped.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        tracing::info!(agent = self.id(), "stopped agent");
    }

    /// Whether the agent is currently running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Register a handler for `message_type`. Overwrites any existing
    /// handler for the same type.
    pub async fn register_message_handler(&self, message_type: impl Into<String>, handler: MessageHandler) {
        self.handlers.write().await.insert(message_type.into(), handler);
    }

    /// Dispatch `message` to the handler registered for its `message_type`,
    /// if any. Returns `None` when there is no matching handler, matching
    /// how an unhandled message type is logged and otherwise ignored.
    pub async fn handle_message(&self, message: AgentMessage) -> Option<AgentResult> {
        let handler = {
            let handlers = self.handlers.read().await;
            handlers.get(&message.message_type).cloned()
        };
        match handler {
            Some(handler) => Some(handler(message).await),
            None => {
                tracing::warn!(message_type = %message.message_type, "no handler for message type");
                None
            }
        }
    }
}
