//! End-to-end scenarios exercising the scheduler, the message bus, and a
//! real (child-process) tool server together.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use genflow::prelude::*;
use serde_json::json;

struct EchoAgent(String);

#[async_trait]
impl Agent for EchoAgent {
    fn id(&self) -> &str {
        &self.0
    }
    async fn execute(&self, task_description: &str, _context: &ExecutionContext) -> AgentResult {
        AgentResult::success(json!(task_description))
    }
}

struct FlakyAgent {
    id: String,
    failures_remaining: AtomicU32,
}

#[async_trait]
impl Agent for FlakyAgent {
    fn id(&self) -> &str {
        &self.id
    }
    async fn execute(&self, _task_description: &str, _context: &ExecutionContext) -> AgentResult {
        if self.failures_remaining.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| if n > 0 { Some(n - 1) } else { None }).is_ok() {
            AgentResult::failure("transient failure")
        } else {
            AgentResult::success(json!("recovered"))
        }
    }
}

struct AlwaysFailsAgent(String);

#[async_trait]
impl Agent for AlwaysFailsAgent {
    fn id(&self) -> &str {
        &self.0
    }
    async fn execute(&self, _task_description: &str, _context: &ExecutionContext) -> AgentResult {
        AgentResult::failure("permanent failure")
    }
}

#[tokio::test]
async fn linear_workflow_runs_every_task_to_success() {
    let scheduler = Scheduler::new();
    scheduler.register_agent(Arc::new(EchoAgent("worker".into()))).await;

    let workflow = WorkflowBuilder::new("linear", "linear happy path")
        .add_task(TaskDefinition::new("fetch", "worker", "fetch data"))
        .add_task(TaskDefinition::new("transform", "worker", "transform data").depends_on(["fetch"]))
        .add_task(TaskDefinition::new("publish", "worker", "publish data").depends_on(["transform"]))
        .build()
        .unwrap();
    scheduler.create_workflow(workflow).await.unwrap();

    let execution = scheduler.execute_workflow("linear", HashMap::new()).await.unwrap();
    assert_eq!(execution.status, WorkflowStatus::Success);
    for task_id in ["fetch", "transform", "publish"] {
        assert_eq!(execution.task_executions[task_id].status, TaskStatus::Success);
    }
}

#[tokio::test]
async fn task_that_fails_twice_then_succeeds_completes_the_workflow() {
    let scheduler = Scheduler::new();
    scheduler.register_agent(Arc::new(FlakyAgent { id: "flaky".into(), failures_remaining: AtomicU32::new(2) })).await;

    let workflow = WorkflowBuilder::new("retry", "retry then succeed")
        .add_task(TaskDefinition::new("unstable", "flaky", "do the flaky thing").with_retry_count(3))
        .build()
        .unwrap();
    scheduler.create_workflow(workflow).await.unwrap();

    let execution = scheduler.execute_workflow("retry", HashMap::new()).await.unwrap();
    assert_eq!(execution.status, WorkflowStatus::Success);
    assert_eq!(execution.task_executions["unstable"].attempts, 2);
}

#[tokio::test]
async fn downstream_task_is_blocked_by_a_permanently_failed_dependency() {
    let scheduler = Scheduler::new();
    scheduler.register_agent(Arc::new(AlwaysFailsAgent("bad".into()))).await;
    scheduler.register_agent(Arc::new(EchoAgent("good".into()))).await;

    let workflow = WorkflowBuilder::new("blocked", "dependency block")
        .add_task(TaskDefinition::new("setup", "bad", "set things up").with_retry_count(0))
        .add_task(TaskDefinition::new("use_it", "good", "use the setup").depends_on(["setup"]))
        .build()
        .unwrap();
    scheduler.create_workflow(workflow).await.unwrap();

    let execution = scheduler.execute_workflow("blocked", HashMap::new()).await.unwrap();
    assert_eq!(execution.status, WorkflowStatus::Failed);
    assert_eq!(execution.task_executions["setup"].status, TaskStatus::Failed);
    assert_eq!(execution.task_executions["use_it"].status, TaskStatus::Pending);
}

#[tokio::test]
async fn tool_call_round_trips_through_a_real_child_process_server() {
    let pool = Arc::new(ConnectionPool::new());
    let mut registry = ToolRegistry::new();
    let config = McpServerConfig::new(env!("CARGO_BIN_EXE_genflow-echo-tool-server"));

    registry.register_mcp_server(config, Arc::clone(&pool)).await.unwrap();

    let result = registry.call("echo", json!({ "text": "hello tools" })).await.unwrap();
    assert_eq!(result, json!("echo: hello tools"));
}

#[tokio::test]
async fn broadcast_reaches_every_agent_except_the_sender() {
    let bus = Bus::new();
    bus.register_agent("alice").await;
    bus.register_agent("bob").await;
    bus.register_agent("carol").await;
    bus.start().await;

    bus.broadcast("alice", "status update").await;

    let alice_inbox = bus.receive("alice", Duration::from_millis(100)).await;
    let bob_inbox = bus.receive("bob", Duration::from_millis(200)).await;
    let carol_inbox = bus.receive("carol", Duration::from_millis(200)).await;

    assert!(alice_inbox.is_empty());
    assert_eq!(bob_inbox.len(), 1);
    assert_eq!(carol_inbox.len(), 1);
    assert_eq!(bob_inbox[0].content, "status update");

    bus.stop().await;
}

#[tokio::test]
async fn request_response_correlates_reply_to_the_original_request() {
    let bus = Bus::new();
    bus.register_agent("client").await;
    bus.register_agent("server").await;
    bus.start().await;

    let server_bus = Arc::clone(&bus);
    tokio::spawn(async move {
        let requests = server_bus.receive("server", Duration::from_secs(1)).await;
        for request in requests {
            let correlation_id = request.metadata.get("correlation_id").cloned().unwrap();
            let reply = AgentMessage::new("server", "client", "42").with_type("response").with_metadata("correlation_id", correlation_id);
            server_bus.send(reply).await;
        }
    });

    let response = bus.request_response("client", "server", "what is the answer?", Duration::from_secs(2)).await;
    assert_eq!(response.map(|m| m.content), Some("42".to_string()));

    bus.stop().await;
}
