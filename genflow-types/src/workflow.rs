//! Workflow definitions and per-run workflow execution state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, HashSet};

use crate::error::ValidationError;
use crate::task::{validate_dependencies, TaskDefinition, TaskExecution, TaskStatus};

/// Definition of a workflow: a named DAG of tasks plus context shared by all of them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    /// Unique id of this workflow.
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// The task DAG.
    pub tasks: Vec<TaskDefinition>,
    /// Context available to every task, overridden by per-task and
    /// per-execution context on conflicting keys.
    #[serde(default)]
    pub global_context: HashMap<String, Value>,
    /// Maximum number of tasks the scheduler may run concurrently.
    #[serde(default = "default_max_parallel_tasks")]
    pub max_parallel_tasks: usize,
}

/// Default concurrency cap for a workflow that does not specify one.
pub const DEFAULT_MAX_PARALLEL_TASKS: usize = 5;

fn default_max_parallel_tasks() -> usize {
    DEFAULT_MAX_PARALLEL_TASKS
}

impl WorkflowDefinition {
    /// Build a workflow with no tasks and no global context.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            tasks: Vec::new(),
            global_context: HashMap::new(),
            max_parallel_tasks: DEFAULT_MAX_PARALLEL_TASKS,
        }
    }

    /// Check that task ids are unique, every dependency refers to a task
    /// that exists in this workflow, and the dependency graph has no cycle.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut seen = HashSet::new();
        for task in &self.tasks {
            if !seen.insert(task.id.as_str()) {
                return Err(ValidationError::DuplicateTaskId(task.id.clone()));
            }
        }

        let task_ids: HashSet<&str> = self.tasks.iter().map(|t| t.id.as_str()).collect();
        let deps_by_id: HashMap<&str, &[String]> = self
            .tasks
            .iter()
            .map(|t| (t.id.as_str(), t.depends_on.as_slice()))
            .collect();

        validate_dependencies(&task_ids, &deps_by_id)
    }

    /// Tasks with no unmet dependency, given a map of already-known statuses.
    /// A task is ready once every task it depends on has `Success` status and
    /// it has not itself started yet.
    pub fn ready_tasks<'a>(&'a self, statuses: &HashMap<String, TaskStatus>) -> Vec<&'a TaskDefinition> {
        self.tasks
            .iter()
            .filter(|task| {
                let own_status = statuses.get(&task.id).copied().unwrap_or(TaskStatus::Pending);
                if own_status != TaskStatus::Pending {
                    return false;
                }
                task.depends_on
                    .iter()
                    .all(|dep| statuses.get(dep).copied() == Some(TaskStatus::Success))
            })
            .collect()
    }
}

/// Fluent constructor for a [`WorkflowDefinition`], mirroring how workflows
/// tend to be assembled programmatically: a name, then tasks added one at a
/// time, then a validating `build`.
#[derive(Debug, Clone)]
pub struct WorkflowBuilder {
    id: String,
    name: String,
    tasks: Vec<TaskDefinition>,
    global_context: HashMap<String, Value>,
    max_parallel_tasks: usize,
}

impl WorkflowBuilder {
    /// Start building a workflow with the given id and name.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            tasks: Vec::new(),
            global_context: HashMap::new(),
            max_parallel_tasks: DEFAULT_MAX_PARALLEL_TASKS,
        }
    }

    /// Append a task to the workflow.
    pub fn add_task(mut self, task: TaskDefinition) -> Self {
        self.tasks.push(task);
        self
    }

    /// Set a global context key/value pair.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.global_context.insert(key.into(), value.into());
        self
    }

    /// Set the maximum number of tasks run concurrently.
    pub fn with_max_parallel_tasks(mut self, max_parallel_tasks: usize) -> Self {
        self.max_parallel_tasks = max_parallel_tasks;
        self
    }

    /// Finish building, validating the resulting DAG.
    pub fn build(self) -> Result<WorkflowDefinition, ValidationError> {
        let workflow = WorkflowDefinition {
            id: self.id,
            name: self.name,
            tasks: self.tasks,
            global_context: self.global_context,
            max_parallel_tasks: self.max_parallel_tasks,
        };
        workflow.validate()?;
        Ok(workflow)
    }
}

/// Status of a workflow's execution as a whole.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    /// Registered but not yet started.
    Created,
    /// At least one task is pending or running.
    Running,
    /// Every task reached `Success` (or `Skipped`).
    Success,
    /// At least one task reached `Failed` and the run is not recoverable.
    Failed,
    /// Execution was cancelled before completion.
    Cancelled,
}

/// Per-run execution state of a workflow: one [`TaskExecution`] per task,
/// plus a roll-up status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowExecution {
    /// Id of the workflow definition this run is executing.
    pub workflow_id: String,
    /// Status of the run as a whole.
    pub status: WorkflowStatus,
    /// Per-task execution state, keyed by task id.
    pub task_executions: HashMap<String, TaskExecution>,
    /// Context supplied at invocation time, merged on top of
    /// `global_context` and each task's own `context`.
    #[serde(default)]
    pub execution_context: HashMap<String, Value>,
    /// Timestamp the run started.
    pub start_time: Option<DateTime<Utc>>,
    /// Timestamp the run reached a terminal status.
    pub end_time: Option<DateTime<Utc>>,
}

impl WorkflowExecution {
    /// Build a fresh `Created` execution with a `Pending` entry for every task.
    pub fn new(definition: &WorkflowDefinition, execution_context: HashMap<String, Value>) -> Self {
        let task_executions = definition
            .tasks
            .iter()
            .map(|t| (t.id.clone(), TaskExecution::pending(t.id.clone())))
            .collect();

        Self {
            workflow_id: definition.id.clone(),
            status: WorkflowStatus::Created,
            task_executions,
            execution_context,
            start_time: None,
            end_time: None,
        }
    }

    /// Current status of each task, for ready-set computation.
    pub fn task_statuses(&self) -> HashMap<String, TaskStatus> {
        self.task_executions
            .iter()
            .map(|(id, exec)| (id.clone(), exec.status))
            .collect()
    }

    /// Mark the run started, if it has not already been.
    pub fn mark_started(&mut self) {
        if self.start_time.is_none() {
            self.start_time = Some(Utc::now());
            self.status = WorkflowStatus::Running;
        }
    }

    /// Recompute the roll-up status from current task statuses. Call after
    /// every task transition. Does nothing if the run was cancelled.
    pub fn recompute_status(&mut self) {
        if self.status == WorkflowStatus::Cancelled {
            return;
        }

        let any_failed = self
            .task_executions
            .values()
            .any(|e| e.status == TaskStatus::Failed);
        let all_terminal = self.task_executions.values().all(|e| e.status.is_terminal());

        self.status = if any_failed {
            WorkflowStatus::Failed
        } else if all_terminal {
            WorkflowStatus::Success
        } else {
            WorkflowStatus::Running
        };

        if matches!(self.status, WorkflowStatus::Success | WorkflowStatus::Failed) && self.end_time.is_none() {
            self.end_time = Some(Utc::now());
        }
    }

    /// Mark the run cancelled.
    pub fn cancel(&mut self) {
        self.status = WorkflowStatus::Cancelled;
        self.end_time = Some(Utc::now());
    }
}
