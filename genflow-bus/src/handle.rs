//! Per-agent convenience wrapper over a shared [`Bus`].

use std::sync::Arc;
use std::time::Duration;

use genflow_types::{AgentMessage, MessageFilter};
use tokio::sync::Mutex;

use crate::bus::Bus;
use crate::handler::HandlerFn;

/// A agent's view of the bus: fixes `agent_id` as the implicit sender, and
/// tracks subscription ids created through it so they can all be torn down
/// with one [`cleanup`](Self::cleanup) call.
pub struct BusHandle {
    bus: Arc<Bus>,
    agent_id: String,
    subscriptions: Mutex<Vec<String>>,
}

impl BusHandle {
    /// Wrap `bus` for `agent_id`, registering its queue if not already registered.
    pub async fn new(bus: Arc<Bus>, agent_id: impl Into<String>) -> Self {
        let agent_id = agent_id.into();
        bus.register_agent(agent_id.clone()).await;
        Self { bus, agent_id, subscriptions: Mutex::new(Vec::new()) }
    }

    /// This handle's agent id.
    pub fn agent_id(&self) -> &str {
        &self.agent_id
    }

    /// Send a message to `recipient` as this agent.
    pub async fn send(&self, recipient: impl Into<String>, content: impl Into<String>) -> bool {
        self.bus.send(AgentMessage::new(self.agent_id.clone(), recipient, content)).await
    }

    /// Broadcast a message as this agent.
    pub async fn broadcast(&self, content: impl Into<String>) -> bool {
        self.bus.broadcast(self.agent_id.clone(), content).await
    }

    /// Drain this agent's queue, waiting up to `timeout` if empty.
    pub async fn receive(&self, timeout: Duration) -> Vec<AgentMessage> {
        self.bus.receive(&self.agent_id, timeout).await
    }

    /// Subscribe to messages matching `filter`, tracking the handler id for
    /// later [`cleanup`](Self::cleanup).
    pub async fn subscribe(&self, filter: MessageFilter, callback: HandlerFn) -> String {
        let id = self.bus.subscribe(filter, callback).await;
        self.subscriptions.lock().await.push(id.clone());
        id
    }

    /// Remove one of this handle's subscriptions.
    pub async fn unsubscribe(&self, handler_id: &str) -> bool {
        self.subscriptions.lock().await.retain(|id| id != handler_id);
        self.bus.unsubscribe(handler_id).await
    }

    /// Send a correlated request to `recipient` and await its reply.
    pub async fn request_response(&self, recipient: impl Into<String>, content: impl Into<String>, timeout: Duration) -> Option<AgentMessage> {
        self.bus.request_response(self.agent_id.clone(), recipient, content, timeout).await
    }

    /// Remove every subscription created through this handle and unregister
    /// this agent's queue.
    pub async fn cleanup(&self) {
        let ids = std::mem::take(&mut *self.subscriptions.lock().await);
        for id in ids {
            self.bus.unsubscribe(&id).await;
        }
        self.bus.unregister_agent(&self.agent_id).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use genflow_types::AgentResult;
    use serde_json::json;
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn send_and_receive_round_trip_through_a_handle() {
        let bus = Bus::new();
        bus.start().await;
        let alice = BusHandle::new(Arc::clone(&bus), "alice").await;
        let bob = BusHandle::new(Arc::clone(&bus), "bob").await;

        alice.send("bob", "hi").await;
        let inbox = bob.receive(Duration::from_millis(200)).await;
        assert_eq!(inbox.len(), 1);
        assert_eq!(inbox[0].content, "hi");

        bus.stop().await;
    }

    #[tokio::test]
    async fn cleanup_removes_tracked_subscriptions() {
        let bus = Bus::new();
        bus.start().await;
        let handle = BusHandle::new(Arc::clone(&bus), "alice").await;

        let (tx, _rx) = mpsc::unbounded_channel();
        handle
            .subscribe(
                MessageFilter::any(),
                Arc::new(move |message: AgentMessage| {
                    let tx = tx.clone();
                    Box::pin(async move {
                        let _ = tx.send(message);
                        Ok(AgentResult::success(json!("ok")))
                    })
                }),
            )
            .await;

        assert_eq!(bus.stats().await.active_handlers, 1);
        handle.cleanup().await;
        assert_eq!(bus.stats().await.active_handlers, 0);
        assert_eq!(bus.stats().await.registered_agents, 0);

        bus.stop().await;
    }
}
