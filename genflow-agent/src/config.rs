//! Agent configuration.

use std::collections::HashMap;

use genflow_mcp::McpServerConfig;
use genflow_types::DurationSecs;

/// Default model identifier used when a config doesn't name one explicitly
/// but still wants AI capability (see [`AgentConfig::with_model`]).
pub const DEFAULT_MODEL: &str = "gpt-4o";

/// Default number of retries the scheduler should allow for tasks dispatched
/// to this agent.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default per-task timeout, in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Configuration for one agent: its identity, optional model backing, and
/// the tool servers it has access to.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Human-readable name; combined with a short random suffix to form the
    /// agent's id.
    pub name: String,
    /// What the agent is for.
    pub description: String,
    /// Model identifier to invoke. `None` means the agent is degenerate: it
    /// acknowledges tasks without calling out to a model.
    pub model: Option<String>,
    /// System prompt passed to the model, if any.
    pub system_prompt: String,
    /// Tool servers this agent should register tools from.
    pub mcp_servers: Vec<McpServerConfig>,
    /// Retries the scheduler should allow per task for this agent.
    pub max_retries: u32,
    /// Per-task timeout the scheduler should enforce for this agent.
    pub timeout: DurationSecs,
}

impl AgentConfig {
    /// A degenerate config with no model: `execute` returns a canned
    /// acknowledgement synchronously.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            model: None,
            system_prompt: String::new(),
            mcp_servers: Vec::new(),
            max_retries: DEFAULT_MAX_RETRIES,
            timeout: DurationSecs::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    /// Set the description, consuming and returning `self`.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Set the model identifier, consuming and returning `self`.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Set the system prompt, consuming and returning `self`.
    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = system_prompt.into();
        self
    }

    /// Add a tool server, consuming and returning `self`.
    pub fn with_mcp_server(mut self, server: McpServerConfig) -> Self {
        self.mcp_servers.push(server);
        self
    }

    /// Override max retries, consuming and returning `self`.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Override the timeout, consuming and returning `self`.
    pub fn with_timeout(mut self, timeout: DurationSecs) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Free-form per-execution context, as handed to [`crate::Agent::execute`].
pub type ExecutionContext = HashMap<String, serde_json::Value>;
