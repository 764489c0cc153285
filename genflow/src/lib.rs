#![deny(missing_docs)]
//! # genflow — umbrella crate
//!
//! Single import surface for building a multi-agent workflow system: define
//! agents backed by a model provider and/or MCP tool servers, wire them into
//! a [`Scheduler`](genflow_orch::Scheduler) as a dependency DAG of tasks, and
//! optionally have them talk to each other over a [`Bus`](genflow_bus::Bus).

pub use genflow_agent as agent;
pub use genflow_bus as bus;
pub use genflow_mcp as mcp;
pub use genflow_orch as orch;
pub use genflow_tool as tool;
pub use genflow_types as types;

/// Happy-path imports for composing a genflow system.
pub mod prelude {
    pub use genflow_agent::{Agent, AgentConfig, AgentFactory, AgentRuntime, ExecutionContext, ModelAgent, ModelOutput, ModelProvider};
    pub use genflow_bus::{Bus, BusStats, MessageHandler};
    pub use genflow_mcp::{ConnectionPool, McpClient, McpServerConfig, McpTool, PoolInfo};
    pub use genflow_orch::{Scheduler, SchedulerError};
    pub use genflow_tool::{ToolDyn, ToolRegistry};
    pub use genflow_types::{
        AgentMessage, AgentResult, ConnectionError, DurationSecs, MessageFilter, ProtocolError, TaskDefinition, TaskExecution, TaskStatus, ToolError, ValidationError, WorkflowBuilder,
        WorkflowDefinition, WorkflowExecution, WorkflowStatus,
    };
}
