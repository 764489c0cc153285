//! Shared data model for genflow: task and workflow definitions, execution
//! state, agent messages, and the error kinds raised across the workspace.
//!
//! This crate has no async runtime dependency and no I/O. Everything in it
//! is plain data plus the validation logic that only needs the data itself
//! (dependency-graph checks, status roll-ups).

pub mod duration;
pub mod error;
pub mod id;
pub mod message;
pub mod task;
pub mod workflow;

pub use duration::DurationSecs;
pub use error::{ConnectionError, ProtocolError, ToolError, ValidationError};
pub use id::{AgentId, TaskId, WorkflowId, BROADCAST};
pub use message::{AgentMessage, AgentResult, MessageFilter};
pub use task::{TaskDefinition, TaskExecution, TaskStatus};
pub use workflow::{WorkflowBuilder, WorkflowDefinition, WorkflowExecution, WorkflowStatus};
