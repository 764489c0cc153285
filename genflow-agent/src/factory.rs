//! Predefined agent configurations.

use std::sync::Arc;

use genflow_tool::ToolRegistry;

use crate::agent::{Agent, ModelAgent};
use crate::config::AgentConfig;
use crate::model::ModelProvider;

const WORKFLOW_AGENT_SYSTEM_PROMPT: &str = "You are a workflow management agent. Your role is to:\n\
1. Create and modify workflow definitions\n\
2. Coordinate execution between multiple agents\n\
3. Monitor workflow progress and handle errors\n\
4. Generate reports on workflow outcomes\n\
\n\
You have access to various tools through tool servers for interacting with external systems.";

/// Builds agents from predefined configurations, mirroring the handful of
/// agent shapes most workflows need.
pub struct AgentFactory;

impl AgentFactory {
    /// Build a standard agent: model-backed if `config.model` is set,
    /// degenerate otherwise.
    pub fn create_agent(
        id: impl Into<String>,
        config: AgentConfig,
        provider: Option<Arc<dyn ModelProvider>>,
        tools: Option<Arc<ToolRegistry>>,
    ) -> Arc<dyn Agent> {
        Arc::new(ModelAgent::new(id, config, provider, tools))
    }

    /// Build an agent pre-loaded with the workflow-management system prompt,
    /// for agents whose job is to author or steer other workflows.
    pub fn create_workflow_agent(
        id: impl Into<String>,
        mut config: AgentConfig,
        provider: Option<Arc<dyn ModelProvider>>,
        tools: Option<Arc<ToolRegistry>>,
    ) -> Arc<dyn Agent> {
        if config.system_prompt.is_empty() {
            config = config.with_system_prompt(WORKFLOW_AGENT_SYSTEM_PROMPT);
        }
        Arc::new(ModelAgent::new(id, config, provider, tools))
    }
}
