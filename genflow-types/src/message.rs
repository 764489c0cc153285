//! Messages and results exchanged between agents and the scheduler.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use uuid::Uuid;

use crate::id::BROADCAST;

/// A message sent between agents over the bus.
///
/// Immutable once created: routing (broadcast fan-out, retries) clones the
/// message and mints a fresh `id` rather than mutating an existing one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentMessage {
    /// Unique id of this message instance.
    pub id: String,
    /// Agent id of the sender.
    pub sender: String,
    /// Agent id of the recipient, or [`BROADCAST`] for fan-out to all agents.
    pub recipient: String,
    /// Free-form message body.
    pub content: String,
    /// Application-defined message type, used for filtering/subscription.
    pub message_type: String,
    /// Arbitrary metadata (correlation ids, routing hints, etc.).
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
}

impl AgentMessage {
    /// Build a new message with a freshly minted id and `message_type: "general"`.
    pub fn new(sender: impl Into<String>, recipient: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            sender: sender.into(),
            recipient: recipient.into(),
            content: content.into(),
            message_type: "general".to_string(),
            metadata: HashMap::new(),
        }
    }

    /// Set the message type, consuming and returning `self` (builder style).
    pub fn with_type(mut self, message_type: impl Into<String>) -> Self {
        self.message_type = message_type.into();
        self
    }

    /// Attach a metadata key/value pair, consuming and returning `self`.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Build a broadcast message addressed to [`BROADCAST`].
    pub fn broadcast(sender: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new(sender, BROADCAST, content).with_type("broadcast")
    }

    /// Whether this message is addressed to every registered agent.
    pub fn is_broadcast(&self) -> bool {
        self.recipient == BROADCAST
    }

    /// Clone this message for delivery to a single recipient, minting a fresh id.
    ///
    /// Used by the bus when fanning a broadcast out to each registered agent.
    pub fn retargeted(&self, recipient: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            sender: self.sender.clone(),
            recipient: recipient.into(),
            content: self.content.clone(),
            message_type: self.message_type.clone(),
            metadata: self.metadata.clone(),
        }
    }
}

/// Optional filter applied when subscribing to the bus or querying history.
///
/// All specified predicates must hold for a message to match (logical AND);
/// a `None` field places no constraint.
#[derive(Debug, Clone, Default)]
pub struct MessageFilter {
    /// Match only messages from this sender.
    pub sender: Option<String>,
    /// Match only messages addressed to this recipient.
    pub recipient: Option<String>,
    /// Match only messages of this type.
    pub message_type: Option<String>,
    /// Match only messages whose metadata contains all of these key/value pairs.
    pub metadata: HashMap<String, Value>,
}

impl MessageFilter {
    /// An empty filter that matches every message.
    pub fn any() -> Self {
        Self::default()
    }

    /// Whether `message` satisfies every predicate in this filter.
    pub fn matches(&self, message: &AgentMessage) -> bool {
        if let Some(sender) = &self.sender
            && sender != &message.sender
        {
            return false;
        }
        if let Some(recipient) = &self.recipient
            && recipient != &message.recipient
        {
            return false;
        }
        if let Some(message_type) = &self.message_type
            && message_type != &message.message_type
        {
            return false;
        }
        for (key, expected) in &self.metadata {
            match message.metadata.get(key) {
                Some(actual) if actual == expected => {}
                _ => return false,
            }
        }
        true
    }
}

/// The outcome of one agent execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentResult {
    /// Whether the agent completed the task successfully.
    pub success: bool,
    /// The agent's output, present on success.
    pub result: Option<Value>,
    /// A human-readable failure description, present on failure.
    pub error: Option<String>,
    /// Execution metadata (agent id, model, usage, etc.).
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
}

impl AgentResult {
    /// Build a successful result.
    pub fn success(result: impl Into<Value>) -> Self {
        Self {
            success: true,
            result: Some(result.into()),
            error: None,
            metadata: HashMap::new(),
        }
    }

    /// Build a failed result.
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            result: None,
            error: Some(error.into()),
            metadata: HashMap::new(),
        }
    }

    /// Attach a metadata key/value pair, consuming and returning `self`.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}
