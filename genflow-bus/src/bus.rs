//! The message bus: routes sent messages to recipient queues and matching
//! subscription handlers.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use genflow_types::{AgentMessage, MessageFilter};
use tokio::sync::{Mutex, RwLock, mpsc};
use tokio::task::JoinHandle;

use crate::handler::{HandlerFn, MessageHandler};
use crate::history::History;
use crate::queue::RecipientQueue;
use crate::stats::BusStats;

/// How long the processor task waits for a message before checking whether
/// it's been asked to stop.
const PROCESSOR_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Central in-process publish/subscribe bus for inter-agent messages.
///
/// Sending enqueues onto a global ingress channel; a single processor task
/// dequeues and routes each message to its recipient's queue (or, for a
/// broadcast, to every registered agent but the sender), then fans the
/// original message out to every matching subscription handler.
pub struct Bus {
    queues: RwLock<HashMap<String, Arc<RecipientQueue>>>,
    handlers: RwLock<Vec<MessageHandler>>,
    global_tx: mpsc::UnboundedSender<AgentMessage>,
    global_rx: Mutex<Option<mpsc::UnboundedReceiver<AgentMessage>>>,
    global_history: Mutex<History>,
    running: AtomicBool,
    processor: Mutex<Option<JoinHandle<()>>>,
    messages_sent: AtomicU64,
    messages_delivered: AtomicU64,
    messages_failed: AtomicU64,
    handler_failures: AtomicU64,
}

impl Bus {
    /// Build a bus with no registered agents or handlers, not yet started.
    pub fn new() -> Arc<Self> {
        let (global_tx, global_rx) = mpsc::unbounded_channel();
        Arc::new(Self {
            queues: RwLock::new(HashMap::new()),
            handlers: RwLock::new(Vec::new()),
            global_tx,
            global_rx: Mutex::new(Some(global_rx)),
            global_history: Mutex::new(History::new()),
            running: AtomicBool::new(false),
            processor: Mutex::new(None),
            messages_sent: AtomicU64::new(0),
            messages_delivered: AtomicU64::new(0),
            messages_failed: AtomicU64::new(0),
            handler_failures: AtomicU64::new(0),
        })
    }

    /// Start the ingress-processor task. A no-op if already running.
    pub async fn start(self: &Arc<Self>) {
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }

        let Some(mut rx) = self.global_rx.lock().await.take() else {
            return;
        };

        let bus = Arc::clone(self);
        let task = tokio::spawn(async move {
            while bus.running.load(Ordering::SeqCst) {
                match tokio::time::timeout(PROCESSOR_POLL_INTERVAL, rx.recv()).await {
                    Ok(Some(message)) => Arc::clone(&bus).route_message(message).await,
                    Ok(None) => break,
                    Err(_) => continue,
                }
            }
            *bus.global_rx.lock().await = Some(rx);
        });

        *self.processor.lock().await = Some(task);
        tracing::info!("message bus started");
    }

    /// Signal the processor task to stop and await its termination.
    /// Messages already queued for recipients remain retrievable.
    pub async fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        if let Some(task) = self.processor.lock().await.take() {
            let _ = task.await;
        }
        tracing::info!("message bus stopped");
    }

    /// Register an agent, creating its per-recipient queue.
    pub async fn register_agent(&self, agent_id: impl Into<String>) {
        let agent_id = agent_id.into();
        self.queues.write().await.insert(agent_id.clone(), Arc::new(RecipientQueue::new()));
        tracing::debug!(agent = %agent_id, "registered agent with message bus");
    }

    /// Unregister an agent, discarding its queue.
    pub async fn unregister_agent(&self, agent_id: &str) {
        self.queues.write().await.remove(agent_id);
        tracing::debug!(agent = %agent_id, "unregistered agent from message bus");
    }

    /// Subscribe `callback` to messages matching `filter`. Returns a handler
    /// id for later [`unsubscribe`](Self::unsubscribe).
    pub async fn subscribe(&self, filter: MessageFilter, callback: HandlerFn) -> String {
        let id = uuid::Uuid::new_v4().to_string();
        self.handlers.write().await.push(MessageHandler { id: id.clone(), filter, callback });
        id
    }

    /// Remove a subscription by id. Returns whether one was found.
    pub async fn unsubscribe(&self, handler_id: &str) -> bool {
        let mut handlers = self.handlers.write().await;
        let before = handlers.len();
        handlers.retain(|h| h.id != handler_id);
        handlers.len() != before
    }

    /// Enqueue `message` onto the global ingress queue.
    pub async fn send(&self, message: AgentMessage) -> bool {
        self.global_history.lock().await.push(message.clone());
        match self.global_tx.send(message.clone()) {
            Ok(()) => {
                self.messages_sent.fetch_add(1, Ordering::SeqCst);
                tracing::debug!(id = %message.id, sender = %message.sender, recipient = %message.recipient, "queued message");
                true
            }
            Err(_) => {
                self.messages_failed.fetch_add(1, Ordering::SeqCst);
                false
            }
        }
    }

    /// Convenience for [`send`](Self::send) with a broadcast recipient.
    pub async fn broadcast(&self, sender: impl Into<String>, content: impl Into<String>) -> bool {
        self.send(AgentMessage::broadcast(sender, content)).await
    }

    /// Drain `agent_id`'s queue, waiting up to `timeout` if it's currently empty.
    pub async fn receive(&self, agent_id: &str, timeout: Duration) -> Vec<AgentMessage> {
        let queue = { self.queues.read().await.get(agent_id).cloned() };
        match queue {
            Some(queue) => queue.drain(timeout).await,
            None => Vec::new(),
        }
    }

    /// Send a request to `recipient` and wait up to `timeout` for a reply
    /// from it carrying the same correlation id in its metadata. Returns
    /// `None` on timeout.
    pub async fn request_response(
        &self,
        sender: impl Into<String>,
        recipient: impl Into<String>,
        content: impl Into<String>,
        timeout: Duration,
    ) -> Option<AgentMessage> {
        let sender = sender.into();
        let recipient = recipient.into();
        let correlation_id = uuid::Uuid::new_v4().to_string();

        let request = AgentMessage::new(sender.clone(), recipient.clone(), content)
            .with_type("request")
            .with_metadata("correlation_id", correlation_id.clone())
            .with_metadata("expects_response", true);

        if !self.send(request).await {
            return None;
        }

        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            if remaining.is_zero() {
                return None;
            }
            let poll = remaining.min(Duration::from_secs(1));
            let messages = self.receive(&sender, poll).await;
            for message in messages {
                if message.sender == recipient && message.metadata.get("correlation_id").and_then(|v| v.as_str()) == Some(correlation_id.as_str()) {
                    return Some(message);
                }
            }
        }
    }

    /// A snapshot of current counters and per-agent queue occupancy.
    pub async fn stats(&self) -> BusStats {
        let queues = self.queues.read().await;
        BusStats {
            messages_sent: self.messages_sent.load(Ordering::SeqCst),
            messages_delivered: self.messages_delivered.load(Ordering::SeqCst),
            messages_failed: self.messages_failed.load(Ordering::SeqCst),
            registered_agents: queues.len(),
            active_handlers: self.handlers.read().await.len(),
            queue_sizes: queues.iter().map(|(id, q)| (id.clone(), q.len())).collect(),
        }
    }

    /// Count of handler invocations that returned an error, logged but not
    /// otherwise surfaced.
    pub fn handler_failures(&self) -> u64 {
        self.handler_failures.load(Ordering::SeqCst)
    }

    /// Recent message history, globally or for one agent's queue.
    pub async fn history(&self, agent_id: Option<&str>, limit: usize, filter: Option<&MessageFilter>) -> Vec<AgentMessage> {
        match agent_id {
            Some(agent_id) => {
                let queue = { self.queues.read().await.get(agent_id).cloned() };
                match queue {
                    Some(queue) => queue.history().await.recent(limit, filter),
                    None => Vec::new(),
                }
            }
            None => self.global_history.lock().await.recent(limit, filter),
        }
    }

    async fn route_message(self: Arc<Self>, message: AgentMessage) {
        // One routed send gets exactly one delivered/failed count, no matter
        // how many recipients a broadcast fans out to, so that
        // `messages_delivered + messages_failed <= messages_sent` holds.
        let delivered = if message.is_broadcast() {
            let recipients: Vec<String> = self.queues.read().await.keys().filter(|id| id.as_str() != message.sender).cloned().collect();
            let mut all_ok = true;
            for recipient in recipients {
                if !self.deliver(message.retargeted(recipient)).await {
                    all_ok = false;
                }
            }
            all_ok
        } else {
            self.deliver(message.clone()).await
        };

        if delivered {
            self.messages_delivered.fetch_add(1, Ordering::SeqCst);
        } else {
            self.messages_failed.fetch_add(1, Ordering::SeqCst);
        }

        self.dispatch_handlers(message);
    }

    /// Push `message` onto its recipient's queue. Returns whether it was
    /// accepted; does not itself touch the bus-wide counters.
    async fn deliver(&self, message: AgentMessage) -> bool {
        let queue = { self.queues.read().await.get(&message.recipient).cloned() };
        match queue {
            Some(queue) => match queue.push(message.clone()).await {
                Ok(()) => {
                    tracing::debug!(id = %message.id, recipient = %message.recipient, "delivered message");
                    true
                }
                Err(_) => {
                    tracing::error!(id = %message.id, recipient = %message.recipient, "failed to deliver message: queue full");
                    false
                }
            },
            None => {
                tracing::warn!(recipient = %message.recipient, id = %message.id, "recipient not registered for message");
                false
            }
        }
    }

    fn dispatch_handlers(self: &Arc<Self>, message: AgentMessage) {
        let bus = Arc::clone(self);
        tokio::spawn(async move {
            let matching: Vec<HandlerFn> = {
                let handlers = bus.handlers.read().await;
                handlers.iter().filter(|h| h.matches(&message)).map(|h| Arc::clone(&h.callback)).collect()
            };

            for callback in matching {
                let message = message.clone();
                let bus = Arc::clone(&bus);
                tokio::spawn(async move {
                    if let Err(error) = callback(message).await {
                        bus.handler_failures.fetch_add(1, Ordering::SeqCst);
                        tracing::error!(%error, "message handler failed");
                    }
                });
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use genflow_types::AgentResult;
    use serde_json::json;
    use std::time::Duration;
    use tokio::time::sleep;

    #[tokio::test]
    async fn direct_message_is_delivered_to_recipient_queue() {
        let bus = Bus::new();
        bus.register_agent("alice").await;
        bus.register_agent("bob").await;
        bus.start().await;

        bus.send(AgentMessage::new("alice", "bob", "hi")).await;
        let messages = bus.receive("bob", Duration::from_millis(200)).await;
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].content, "hi");

        bus.stop().await;
    }

    #[tokio::test]
    async fn broadcast_excludes_sender() {
        let bus = Bus::new();
        bus.register_agent("alice").await;
        bus.register_agent("bob").await;
        bus.register_agent("carol").await;
        bus.start().await;

        bus.broadcast("alice", "hello everyone").await;

        let alice_inbox = bus.receive("alice", Duration::from_millis(100)).await;
        assert!(alice_inbox.is_empty());

        let bob_inbox = bus.receive("bob", Duration::from_millis(200)).await;
        let carol_inbox = bus.receive("carol", Duration::from_millis(200)).await;
        assert_eq!(bob_inbox.len(), 1);
        assert_eq!(carol_inbox.len(), 1);
        assert_ne!(bob_inbox[0].id, carol_inbox[0].id);

        bus.stop().await;
    }

    #[tokio::test]
    async fn broadcast_to_many_recipients_counts_as_one_delivery() {
        let bus = Bus::new();
        bus.register_agent("alice").await;
        bus.register_agent("bob").await;
        bus.register_agent("carol").await;
        bus.start().await;

        bus.broadcast("alice", "hello everyone").await;
        sleep(Duration::from_millis(100)).await;

        let stats = bus.stats().await;
        assert_eq!(stats.messages_sent, 1);
        assert_eq!(stats.messages_delivered, 1);
        assert_eq!(stats.messages_failed, 0);
        assert!(stats.messages_delivered + stats.messages_failed <= stats.messages_sent);

        bus.stop().await;
    }

    #[tokio::test]
    async fn delivery_to_unregistered_recipient_counts_as_failed_not_delivered() {
        let bus = Bus::new();
        bus.start().await;

        bus.send(AgentMessage::new("alice", "nobody", "hi")).await;
        sleep(Duration::from_millis(100)).await;

        let stats = bus.stats().await;
        assert_eq!(stats.messages_sent, 1);
        assert_eq!(stats.messages_delivered, 0);
        assert_eq!(stats.messages_failed, 1);

        bus.stop().await;
    }

    #[tokio::test]
    async fn subscribed_handler_runs_concurrently_with_delivery() {
        let bus = Bus::new();
        bus.register_agent("bob").await;
        bus.start().await;

        let mut filter = MessageFilter::any();
        filter.message_type = Some("ping".into());
        let (tx, mut rx) = mpsc::unbounded_channel();
        bus.subscribe(
            filter,
            Arc::new(move |message: AgentMessage| {
                let tx = tx.clone();
                Box::pin(async move {
                    let _ = tx.send(message.content.clone());
                    Ok(AgentResult::success(json!("handled")))
                })
            }),
        )
        .await;

        bus.send(AgentMessage::new("alice", "bob", "ping!").with_type("ping")).await;

        let received = tokio::time::timeout(Duration::from_millis(500), rx.recv()).await.unwrap();
        assert_eq!(received.as_deref(), Some("ping!"));

        bus.stop().await;
    }

    #[tokio::test]
    async fn request_response_matches_on_correlation_id() {
        let bus = Bus::new();
        bus.register_agent("client").await;
        bus.register_agent("server").await;
        bus.start().await;

        let server_bus = Arc::clone(&bus);
        tokio::spawn(async move {
            loop {
                let requests = server_bus.receive("server", Duration::from_millis(50)).await;
                if let Some(request) = requests.into_iter().next() {
                    let correlation_id = request.metadata.get("correlation_id").cloned().unwrap();
                    let reply = AgentMessage::new("server", "client", "pong").with_type("response").with_metadata("correlation_id", correlation_id);
                    server_bus.send(reply).await;
                    return;
                }
            }
        });

        let response = bus.request_response("client", "server", "ping", Duration::from_secs(2)).await;
        assert_eq!(response.map(|m| m.content), Some("pong".to_string()));

        bus.stop().await;
    }
}
