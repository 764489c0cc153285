//! Abstraction over the external language-model provider an agent invokes.
//!
//! The provider call itself (HTTP request to an inference API, token
//! accounting, streaming) is out of scope for this workspace; callers supply
//! their own [`ModelProvider`] implementation. Everything downstream of this
//! trait (agent lifecycle, tool registration, retries) is agnostic to which
//! model or provider is behind it.

use async_trait::async_trait;
use serde_json::Value;

/// One completion request/response with a model.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// Run `prompt` against the model, with `history` as prior turns
    /// (drawn from `context["history"]` by the caller), and return the
    /// model's output plus usage metadata.
    async fn complete(&self, prompt: &str, history: &[Value]) -> Result<ModelOutput, String>;
}

/// A model's response to one [`ModelProvider::complete`] call.
#[derive(Debug, Clone)]
pub struct ModelOutput {
    /// The model's output value.
    pub data: Value,
    /// Usage/accounting metadata (tokens, cost, etc.), provider-specific.
    pub usage: Value,
}

impl ModelOutput {
    /// Build an output with no usage metadata.
    pub fn new(data: impl Into<Value>) -> Self {
        Self { data: data.into(), usage: Value::Null }
    }

    /// Attach usage metadata, consuming and returning `self`.
    pub fn with_usage(mut self, usage: impl Into<Value>) -> Self {
        self.usage = usage.into();
        self
    }
}
