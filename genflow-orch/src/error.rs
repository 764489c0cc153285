//! Errors surfaced by the scheduler's own API (not by tasks it runs — those
//! are captured as a [`genflow_types::AgentResult`] inside a `TaskExecution`).

use genflow_types::ValidationError;

/// Failure modes of the scheduler's own operations.
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    /// `create_workflow` was given a definition with a bad dependency graph.
    #[error("invalid workflow definition: {0}")]
    InvalidDefinition(#[from] ValidationError),
    /// The referenced workflow id was never registered.
    #[error("workflow {0} not found")]
    WorkflowNotFound(String),
    /// The referenced workflow has not been executed yet.
    #[error("workflow {0} has no execution history")]
    NoExecution(String),
}
