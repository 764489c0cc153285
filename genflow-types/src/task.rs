//! Task definitions and per-run task execution state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, HashSet};

use crate::duration::DurationSecs;
use crate::message::AgentResult;

/// Default number of retries for a task that does not specify one.
pub const DEFAULT_RETRY_COUNT: u32 = 3;

/// Default per-task timeout, in seconds, for a task that does not specify one.
pub const DEFAULT_TASK_TIMEOUT_SECS: u64 = 300;

/// Definition of a single task within a workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskDefinition {
    /// Identifier, unique within the owning workflow.
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// Id of the agent that executes this task.
    pub agent_id: String,
    /// Free-form description passed verbatim to the agent.
    pub task_description: String,
    /// Ids of tasks in the same workflow that must succeed before this one runs.
    #[serde(default)]
    pub depends_on: Vec<String>,
    /// Number of retries allowed after the first failed attempt.
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,
    /// Maximum wall-clock time allowed for one attempt.
    #[serde(default = "default_task_timeout")]
    pub timeout: DurationSecs,
    /// Per-task context, merged into the agent's execution context.
    #[serde(default)]
    pub context: HashMap<String, Value>,
}

fn default_retry_count() -> u32 {
    DEFAULT_RETRY_COUNT
}

fn default_task_timeout() -> DurationSecs {
    DurationSecs::from_secs(DEFAULT_TASK_TIMEOUT_SECS)
}

impl TaskDefinition {
    /// Build a task with default retry count and timeout, and no dependencies.
    pub fn new(id: impl Into<String>, agent_id: impl Into<String>, task_description: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            agent_id: agent_id.into(),
            task_description: task_description.into(),
            depends_on: Vec::new(),
            retry_count: DEFAULT_RETRY_COUNT,
            timeout: default_task_timeout(),
            context: HashMap::new(),
        }
    }

    /// Set the dependency list, consuming and returning `self`.
    pub fn depends_on(mut self, deps: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.depends_on = deps.into_iter().map(Into::into).collect();
        self
    }

    /// Override the retry count, consuming and returning `self`.
    pub fn with_retry_count(mut self, retry_count: u32) -> Self {
        self.retry_count = retry_count;
        self
    }

    /// Override the timeout, consuming and returning `self`.
    pub fn with_timeout(mut self, timeout: DurationSecs) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Status of a task's execution within one workflow run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Not yet dispatched.
    Pending,
    /// Currently executing (including retry attempts).
    Running,
    /// Completed successfully.
    Success,
    /// Exhausted its retry budget, or timed out.
    Failed,
    /// Never became ready because a dependency did not succeed. Not
    /// currently assigned by the scheduler (see SPEC_FULL.md Open Questions)
    /// but part of the status space for callers that skip tasks explicitly.
    Skipped,
    /// A failed attempt is about to be retried.
    Retry,
}

impl TaskStatus {
    /// Whether this status will never change again.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Success | Self::Failed | Self::Skipped)
    }
}

/// Per-run execution state of one task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskExecution {
    /// Id of the task this state belongs to.
    pub task_id: String,
    /// Current status.
    pub status: TaskStatus,
    /// Timestamp of the first transition into `Running`.
    pub start_time: Option<DateTime<Utc>>,
    /// Timestamp of the transition into a terminal status.
    pub end_time: Option<DateTime<Utc>>,
    /// Count of completed failed attempts (not counting the one in flight).
    pub attempts: u32,
    /// Result of the most recent attempt, once one has completed.
    pub result: Option<AgentResult>,
    /// Human-readable error, mirrors `result.error` when present.
    pub error: Option<String>,
}

impl TaskExecution {
    /// Build a fresh `Pending` execution record for `task_id`.
    pub fn pending(task_id: impl Into<String>) -> Self {
        Self {
            task_id: task_id.into(),
            status: TaskStatus::Pending,
            start_time: None,
            end_time: None,
            attempts: 0,
            result: None,
            error: None,
        }
    }

    /// Transition to a new status, recording `start_time`/`end_time` per the
    /// same rules as the original workflow engine: `start_time` is set only
    /// on the first transition into `Running`; `end_time` is set on any
    /// transition into a terminal status.
    pub fn transition(&mut self, status: TaskStatus, result: Option<AgentResult>) {
        self.status = status;
        if let Some(result) = &result {
            self.error = result.error.clone();
        }
        self.result = result;

        match status {
            TaskStatus::Running if self.start_time.is_none() => {
                self.start_time = Some(Utc::now());
            }
            _ if status.is_terminal() => {
                self.end_time = Some(Utc::now());
            }
            _ => {}
        }
    }
}

/// Validate that a workflow's dependency set (task id -> deps) is free of
/// unknown references and cycles. Shared by `WorkflowDefinition::validate`
/// and `WorkflowBuilder::build`.
pub(crate) fn validate_dependencies(
    task_ids: &HashSet<&str>,
    deps_by_id: &HashMap<&str, &[String]>,
) -> Result<(), crate::error::ValidationError> {
    use crate::error::ValidationError;

    for (&task_id, deps) in deps_by_id {
        for dep in deps.iter() {
            if !task_ids.contains(dep.as_str()) {
                return Err(ValidationError::UnknownDependency {
                    task: task_id.to_string(),
                    dependency: dep.clone(),
                });
            }
        }
    }

    // DFS cycle detection over the "depends on" edges.
    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        InProgress,
        Done,
    }
    let mut marks: HashMap<&str, Mark> = HashMap::new();

    fn visit<'a>(
        node: &'a str,
        deps_by_id: &HashMap<&'a str, &'a [String]>,
        marks: &mut HashMap<&'a str, Mark>,
    ) -> Result<(), crate::error::ValidationError> {
        match marks.get(node) {
            Some(Mark::Done) => return Ok(()),
            Some(Mark::InProgress) => return Err(crate::error::ValidationError::Cycle),
            None => {}
        }
        marks.insert(node, Mark::InProgress);
        if let Some(deps) = deps_by_id.get(node) {
            for dep in deps.iter() {
                visit(dep.as_str(), deps_by_id, marks)?;
            }
        }
        marks.insert(node, Mark::Done);
        Ok(())
    }

    for &task_id in task_ids {
        visit(task_id, deps_by_id, &mut marks)?;
    }
    Ok(())
}
