//! The Agent contract: the unit of work a workflow task dispatches to.

use std::sync::Arc;

use async_trait::async_trait;
use genflow_tool::ToolRegistry;
use genflow_types::AgentResult;

use crate::config::{AgentConfig, ExecutionContext};
use crate::model::ModelProvider;

/// Binds a configuration to the `execute` contract.
///
/// Implementations must not block the executor thread; `execute` is awaited
/// directly by the scheduler under a per-task timeout.
#[async_trait]
pub trait Agent: Send + Sync {
    /// This agent's id, used to route messages and results.
    fn id(&self) -> &str;

    /// Run `task_description` with `context` and return the outcome.
    ///
    /// Implementations should prefer returning a failed [`AgentResult`] over
    /// propagating a panic; the scheduler treats a panic as an unrecoverable
    /// task unit failure with no retry.
    async fn execute(&self, task_description: &str, context: &ExecutionContext) -> AgentResult;
}

/// A standard agent: model-backed when [`AgentConfig::model`] is set, a
/// degenerate acknowledger otherwise.
pub struct ModelAgent {
    id: String,
    config: AgentConfig,
    provider: Option<Arc<dyn ModelProvider>>,
    tools: Option<Arc<ToolRegistry>>,
}

impl ModelAgent {
    /// Build an agent from `config`, backed by `provider` (required if
    /// `config.model` is set) and optionally `tools` (registered from
    /// `config.mcp_servers` ahead of time by the caller).
    pub fn new(id: impl Into<String>, config: AgentConfig, provider: Option<Arc<dyn ModelProvider>>, tools: Option<Arc<ToolRegistry>>) -> Self {
        Self { id: id.into(), config, provider, tools }
    }
}

#[async_trait]
impl Agent for ModelAgent {
    fn id(&self) -> &str {
        &self.id
    }

    async fn execute(&self, task_description: &str, context: &ExecutionContext) -> AgentResult {
        let Some(provider) = &self.provider else {
            return AgentResult::success(format!("Task '{task_description}' acknowledged by {}", self.config.name))
                .with_metadata("agent_id", self.id.clone())
                .with_metadata("execution_type", "simple");
        };

        let history = context
            .get("history")
            .and_then(serde_json::Value::as_array)
            .cloned()
            .unwrap_or_default();

        tracing::debug!(agent = %self.id, tools = self.tools.as_ref().map(|t| t.len()).unwrap_or(0), "executing model-backed task");

        match provider.complete(task_description, &history).await {
            Ok(output) => AgentResult::success(output.data)
                .with_metadata("agent_id", self.id.clone())
                .with_metadata("model", self.config.model.clone().unwrap_or_default())
                .with_metadata("usage", output.usage),
            Err(error) => {
                tracing::error!(agent = %self.id, %error, "agent execution failed");
                AgentResult::failure(error).with_metadata("agent_id", self.id.clone())
            }
        }
    }
}
