//! The workflow scheduler: validates and registers workflow definitions,
//! then drives each run's task DAG to completion.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use futures::future::{select_all, BoxFuture};
use genflow_agent::Agent;
use genflow_types::{AgentResult, TaskDefinition, TaskStatus, WorkflowDefinition, WorkflowExecution, WorkflowStatus};
use serde_json::Value;
use tokio::sync::{RwLock, Semaphore};
use tokio::task::JoinHandle;

use crate::error::SchedulerError;

/// How long the scheduling loop sleeps when nothing is ready and nothing is
/// running, much shorter than any realistic task timeout.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Registers workflows and agents, then executes workflow runs against them.
pub struct Scheduler {
    agents: RwLock<HashMap<String, Arc<dyn Agent>>>,
    workflows: RwLock<HashMap<String, WorkflowDefinition>>,
    executions: RwLock<HashMap<String, Arc<RwLock<WorkflowExecution>>>>,
}

impl Scheduler {
    /// Build a scheduler with no registered agents or workflows.
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            agents: RwLock::new(HashMap::new()),
            workflows: RwLock::new(HashMap::new()),
            executions: RwLock::new(HashMap::new()),
        })
    }

    /// Register an agent, making it eligible for tasks that name its id.
    pub async fn register_agent(&self, agent: Arc<dyn Agent>) {
        let id = agent.id().to_string();
        self.agents.write().await.insert(id.clone(), agent);
        tracing::info!(agent = %id, "registered agent with scheduler");
    }

    /// Unregister an agent.
    pub async fn unregister_agent(&self, agent_id: &str) {
        self.agents.write().await.remove(agent_id);
        tracing::info!(agent = %agent_id, "unregistered agent from scheduler");
    }

    /// Validate and register a workflow definition, keyed by its own id.
    pub async fn create_workflow(&self, definition: WorkflowDefinition) -> Result<String, SchedulerError> {
        definition.validate()?;
        let id = definition.id.clone();
        self.workflows.write().await.insert(id.clone(), definition);
        tracing::info!(workflow = %id, "created workflow");
        Ok(id)
    }

    /// Run a previously created workflow to completion.
    pub async fn execute_workflow(self: &Arc<Self>, workflow_id: &str, context: HashMap<String, Value>) -> Result<WorkflowExecution, SchedulerError> {
        let definition = self
            .workflows
            .read()
            .await
            .get(workflow_id)
            .cloned()
            .ok_or_else(|| SchedulerError::WorkflowNotFound(workflow_id.to_string()))?;

        let mut fresh = WorkflowExecution::new(&definition, context);
        fresh.mark_started();
        let execution = Arc::new(RwLock::new(fresh));
        self.executions.write().await.insert(workflow_id.to_string(), Arc::clone(&execution));

        self.run_tasks(&definition, &execution).await;

        let mut final_execution = execution.read().await.clone();
        if final_execution.status != WorkflowStatus::Cancelled {
            final_execution.recompute_status();
            *execution.write().await = final_execution.clone();
        }

        tracing::info!(workflow = %workflow_id, status = ?final_execution.status, "workflow execution finished");
        Ok(final_execution)
    }

    /// The current execution snapshot for a workflow, if it has ever run.
    pub async fn get_workflow_status(&self, workflow_id: &str) -> Option<WorkflowExecution> {
        let executions = self.executions.read().await;
        let execution = executions.get(workflow_id)?;
        Some(execution.read().await.clone())
    }

    /// All registered workflow ids.
    pub async fn list_workflows(&self) -> Vec<String> {
        self.workflows.read().await.keys().cloned().collect()
    }

    /// All registered agent ids.
    pub async fn list_agents(&self) -> Vec<String> {
        self.agents.read().await.keys().cloned().collect()
    }

    /// Cancel a workflow that is currently running. Returns `false` if it
    /// isn't running (including if it never started or already finished).
    pub async fn cancel_workflow(&self, workflow_id: &str) -> bool {
        let executions = self.executions.read().await;
        let Some(execution) = executions.get(workflow_id) else {
            return false;
        };
        let mut exec = execution.write().await;
        if exec.status != WorkflowStatus::Running {
            return false;
        }
        exec.cancel();
        tracing::info!(workflow = %workflow_id, "cancelled workflow");
        true
    }

    /// Drives ready tasks to completion. Task units run as independently
    /// spawned work: if the loop exits early (cancellation), already-spawned
    /// units keep running to their natural conclusion on the runtime — only
    /// their influence on the workflow's final status is discarded.
    async fn run_tasks(self: &Arc<Self>, definition: &WorkflowDefinition, execution: &Arc<RwLock<WorkflowExecution>>) {
        let semaphore = Arc::new(Semaphore::new(definition.max_parallel_tasks.max(1)));
        let mut in_flight: Vec<JoinHandle<String>> = Vec::new();
        let mut running_ids: HashSet<String> = HashSet::new();

        loop {
            if execution.read().await.status == WorkflowStatus::Cancelled {
                break;
            }

            let statuses = execution.read().await.task_statuses();
            let ready: Vec<TaskDefinition> = definition.ready_tasks(&statuses).into_iter().filter(|t| !running_ids.contains(&t.id)).cloned().collect();

            if ready.is_empty() && in_flight.is_empty() {
                if statuses.values().any(|s| *s == TaskStatus::Failed) {
                    tracing::error!(workflow = %definition.id, "workflow blocked by failed tasks");
                    break;
                }
                if statuses.values().all(|s| s.is_terminal()) {
                    break;
                }
                tokio::time::sleep(POLL_INTERVAL).await;
                continue;
            }

            for task in ready {
                running_ids.insert(task.id.clone());
                let unit = Arc::clone(self).execute_task_unit(definition.clone(), task, Arc::clone(execution), Arc::clone(&semaphore));
                in_flight.push(tokio::spawn(unit));
            }

            if !in_flight.is_empty() {
                let (outcome, _index, remaining) = select_all(in_flight).await;
                if let Ok(task_id) = outcome {
                    running_ids.remove(&task_id);
                }
                in_flight = remaining;
            }
        }
    }

    /// Execute one task attempt under the semaphore, retrying recursively
    /// (same slot) on a failed result until the retry budget is exhausted.
    /// Returns the task id once it reaches a terminal status.
    fn execute_task_unit(self: Arc<Self>, definition: WorkflowDefinition, task: TaskDefinition, execution: Arc<RwLock<WorkflowExecution>>, semaphore: Arc<Semaphore>) -> BoxFuture<'static, String> {
        Box::pin(async move {
            let permit = semaphore.acquire().await.expect("semaphore outlives its task units");

            let agent = { self.agents.read().await.get(&task.agent_id).cloned() };
            let Some(agent) = agent else {
                let result = AgentResult::failure(format!("agent {} not found", task.agent_id));
                transition(&execution, &task.id, TaskStatus::Failed, Some(result)).await;
                return task.id;
            };

            transition(&execution, &task.id, TaskStatus::Running, None).await;

            let task_context = merge_contexts(&definition, &task, &execution).await;
            let outcome = tokio::time::timeout(task.timeout.into(), agent.execute(&task.task_description, &task_context)).await;

            match outcome {
                Ok(result) if result.success => {
                    transition(&execution, &task.id, TaskStatus::Success, Some(result)).await;
                    tracing::info!(task = %task.id, "task completed successfully");
                    task.id
                }
                Ok(result) => {
                    let attempts = {
                        let exec = execution.read().await;
                        exec.task_executions.get(&task.id).map(|t| t.attempts).unwrap_or(0)
                    };
                    if attempts < task.retry_count {
                        {
                            let mut exec = execution.write().await;
                            if let Some(task_exec) = exec.task_executions.get_mut(&task.id) {
                                task_exec.attempts += 1;
                            }
                        }
                        transition(&execution, &task.id, TaskStatus::Retry, Some(result)).await;
                        tracing::warn!(task = %task.id, attempts = attempts + 1, retry_count = task.retry_count, "task failed, retrying");
                        drop(permit);
                        return self.execute_task_unit(definition, task, execution, semaphore).await;
                    }
                    transition(&execution, &task.id, TaskStatus::Failed, Some(result)).await;
                    tracing::error!(task = %task.id, retry_count = task.retry_count, "task failed after exhausting retries");
                    task.id
                }
                Err(_) => {
                    let result = AgentResult::failure(format!("timeout after {}s", task.timeout.as_secs()));
                    transition(&execution, &task.id, TaskStatus::Failed, Some(result)).await;
                    tracing::error!(task = %task.id, "task timed out");
                    task.id
                }
            }
        })
    }
}

async fn transition(execution: &Arc<RwLock<WorkflowExecution>>, task_id: &str, status: TaskStatus, result: Option<AgentResult>) {
    let mut exec = execution.write().await;
    if let Some(task_exec) = exec.task_executions.get_mut(task_id) {
        task_exec.transition(status, result);
    }
}

/// Merge context in priority order `global_context < task.context < execution_context`.
async fn merge_contexts(definition: &WorkflowDefinition, task: &TaskDefinition, execution: &Arc<RwLock<WorkflowExecution>>) -> HashMap<String, Value> {
    let mut merged = definition.global_context.clone();
    merged.extend(task.context.clone());
    merged.extend(execution.read().await.execution_context.clone());
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use genflow_types::WorkflowBuilder;
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::sleep;

    struct EchoAgent(&'static str);

    #[async_trait]
    impl Agent for EchoAgent {
        fn id(&self) -> &str {
            self.0
        }
        async fn execute(&self, task_description: &str, context: &HashMap<String, Value>) -> AgentResult {
            AgentResult::success(json!(task_description)).with_metadata("seen_context", json!(context.len()))
        }
    }

    struct FailingAgent(&'static str);

    #[async_trait]
    impl Agent for FailingAgent {
        fn id(&self) -> &str {
            self.0
        }
        async fn execute(&self, _task_description: &str, _context: &HashMap<String, Value>) -> AgentResult {
            AgentResult::failure("always fails")
        }
    }

    struct FlakyAgent {
        id: &'static str,
        failures_remaining: AtomicU32,
    }

    #[async_trait]
    impl Agent for FlakyAgent {
        fn id(&self) -> &str {
            self.id
        }
        async fn execute(&self, _task_description: &str, _context: &HashMap<String, Value>) -> AgentResult {
            if self.failures_remaining.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| if n > 0 { Some(n - 1) } else { None }).is_ok() {
                AgentResult::failure("transient")
            } else {
                AgentResult::success(json!("eventually ok"))
            }
        }
    }

    struct SlowAgent(&'static str);

    #[async_trait]
    impl Agent for SlowAgent {
        fn id(&self) -> &str {
            self.0
        }
        async fn execute(&self, _task_description: &str, _context: &HashMap<String, Value>) -> AgentResult {
            sleep(Duration::from_secs(2)).await;
            AgentResult::success(json!("too slow"))
        }
    }

    #[tokio::test]
    async fn linear_dependency_chain_runs_in_order_and_succeeds() {
        let scheduler = Scheduler::new();
        scheduler.register_agent(Arc::new(EchoAgent("a1"))).await;

        let workflow = WorkflowBuilder::new("w1", "chain")
            .add_task(TaskDefinition::new("t1", "a1", "first"))
            .add_task(TaskDefinition::new("t2", "a1", "second").depends_on(["t1"]))
            .build()
            .unwrap();
        scheduler.create_workflow(workflow).await.unwrap();

        let execution = scheduler.execute_workflow("w1", HashMap::new()).await.unwrap();
        assert_eq!(execution.status, WorkflowStatus::Success);
        assert_eq!(execution.task_executions["t1"].status, TaskStatus::Success);
        assert_eq!(execution.task_executions["t2"].status, TaskStatus::Success);
        assert!(execution.task_executions["t1"].start_time <= execution.task_executions["t2"].start_time);
    }

    #[tokio::test]
    async fn dependency_block_fails_downstream_task_without_running_it() {
        let scheduler = Scheduler::new();
        scheduler.register_agent(Arc::new(FailingAgent("bad"))).await;
        scheduler.register_agent(Arc::new(EchoAgent("good"))).await;

        let workflow = WorkflowBuilder::new("w2", "blocked")
            .add_task(TaskDefinition::new("t1", "bad", "first").with_retry_count(0))
            .add_task(TaskDefinition::new("t2", "good", "second").depends_on(["t1"]))
            .build()
            .unwrap();
        scheduler.create_workflow(workflow).await.unwrap();

        let execution = scheduler.execute_workflow("w2", HashMap::new()).await.unwrap();
        assert_eq!(execution.status, WorkflowStatus::Failed);
        assert_eq!(execution.task_executions["t1"].status, TaskStatus::Failed);
        assert_eq!(execution.task_executions["t2"].status, TaskStatus::Pending);
    }

    #[tokio::test]
    async fn task_retries_until_it_succeeds_within_budget() {
        let scheduler = Scheduler::new();
        scheduler.register_agent(Arc::new(FlakyAgent { id: "flaky", failures_remaining: AtomicU32::new(2) })).await;

        let workflow = WorkflowBuilder::new("w3", "retry")
            .add_task(TaskDefinition::new("t1", "flaky", "try me").with_retry_count(3))
            .build()
            .unwrap();
        scheduler.create_workflow(workflow).await.unwrap();

        let execution = scheduler.execute_workflow("w3", HashMap::new()).await.unwrap();
        assert_eq!(execution.status, WorkflowStatus::Success);
        assert_eq!(execution.task_executions["t1"].attempts, 2);
    }

    #[tokio::test]
    async fn missing_agent_fails_the_task() {
        let scheduler = Scheduler::new();
        let workflow = WorkflowBuilder::new("w4", "no-agent").add_task(TaskDefinition::new("t1", "ghost", "x")).build().unwrap();
        scheduler.create_workflow(workflow).await.unwrap();

        let execution = scheduler.execute_workflow("w4", HashMap::new()).await.unwrap();
        assert_eq!(execution.status, WorkflowStatus::Failed);
        assert!(execution.task_executions["t1"].error.as_deref().unwrap().contains("ghost"));
    }

    #[tokio::test]
    async fn task_timeout_is_terminal_without_retry() {
        let scheduler = Scheduler::new();
        scheduler.register_agent(Arc::new(SlowAgent("slow"))).await;

        let workflow = WorkflowBuilder::new("w5", "timeout")
            .add_task(TaskDefinition::new("t1", "slow", "x").with_timeout(Duration::from_millis(50).into()).with_retry_count(5))
            .build()
            .unwrap();
        scheduler.create_workflow(workflow).await.unwrap();

        let execution = scheduler.execute_workflow("w5", HashMap::new()).await.unwrap();
        assert_eq!(execution.status, WorkflowStatus::Failed);
        assert_eq!(execution.task_executions["t1"].attempts, 0);
        assert!(execution.task_executions["t1"].error.as_deref().unwrap().contains("timeout"));
    }

    #[tokio::test]
    async fn context_merge_priority_favors_execution_context() {
        let scheduler = Scheduler::new();
        scheduler.register_agent(Arc::new(EchoAgent("a1"))).await;

        let workflow = WorkflowBuilder::new("w6", "ctx")
            .add_task(TaskDefinition::new("t1", "a1", "go"))
            .with_context("k", json!("global"))
            .build()
            .unwrap();
        scheduler.create_workflow(workflow).await.unwrap();

        let mut ctx = HashMap::new();
        ctx.insert("k".to_string(), json!("execution"));
        let execution = scheduler.execute_workflow("w6", ctx).await.unwrap();
        assert_eq!(execution.task_executions["t1"].result.as_ref().unwrap().metadata["seen_context"], json!(1));
    }

    #[tokio::test]
    async fn cancel_marks_running_workflow_cancelled() {
        let scheduler = Scheduler::new();
        scheduler.register_agent(Arc::new(SlowAgent("slow"))).await;

        let workflow = WorkflowBuilder::new("w7", "cancel").add_task(TaskDefinition::new("t1", "slow", "x").with_timeout(Duration::from_secs(30).into())).build().unwrap();
        scheduler.create_workflow(workflow).await.unwrap();

        let scheduler_clone = Arc::clone(&scheduler);
        let handle = tokio::spawn(async move { scheduler_clone.execute_workflow("w7", HashMap::new()).await.unwrap() });

        sleep(Duration::from_millis(50)).await;
        assert!(scheduler.cancel_workflow("w7").await);

        let execution = handle.await.unwrap();
        assert_eq!(execution.status, WorkflowStatus::Cancelled);
    }

    #[tokio::test]
    async fn unknown_workflow_returns_not_found_error() {
        let scheduler = Scheduler::new();
        let result = scheduler.execute_workflow("nope", HashMap::new()).await;
        assert!(matches!(result, Err(SchedulerError::WorkflowNotFound(_))));
    }
}
