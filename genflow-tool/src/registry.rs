//! Object-safe tool abstraction and the registry agents look tools up in.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use genflow_mcp::{ConnectionPool, McpServerConfig};
use genflow_types::ToolError;
use serde_json::Value;

use crate::schema::ArgShape;

/// A callable tool, invoked with a JSON object of arguments and returning a
/// JSON result.
///
/// Object-safe so tools from different sources (a tool-server connection, a
/// native function) can be stored uniformly in a [`ToolRegistry`].
pub trait ToolDyn: Send + Sync {
    /// The tool's unique name, as passed to `tools/call`.
    fn name(&self) -> &str;

    /// Human-readable description of what the tool does.
    fn description(&self) -> &str;

    /// JSON Schema describing the tool's arguments.
    fn input_schema(&self) -> &Value;

    /// Execute the tool with the given arguments, already validated against
    /// [`input_schema`](Self::input_schema).
    fn call(&self, arguments: Value) -> Pin<Box<dyn Future<Output = Result<Value, ToolError>> + Send + '_>>;
}

/// A tool backed by a tool-server connection, reacquired from the pool on
/// every call by the server's full fingerprint (command, args, and env) so
/// that two servers sharing a command but differing in args or env never
/// resolve to the wrong pooled connection.
pub struct McpToolHandle {
    name: String,
    description: String,
    input_schema: Value,
    server_config: McpServerConfig,
    pool: Arc<ConnectionPool>,
}

impl McpToolHandle {
    /// Wrap an MCP tool definition discovered from `server_config`'s server.
    pub fn new(tool: genflow_mcp::McpTool, server_config: McpServerConfig, pool: Arc<ConnectionPool>) -> Self {
        Self { name: tool.name, description: tool.description, input_schema: tool.input_schema, server_config, pool }
    }
}

impl ToolDyn for McpToolHandle {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn input_schema(&self) -> &Value {
        &self.input_schema
    }

    fn call(&self, arguments: Value) -> Pin<Box<dyn Future<Output = Result<Value, ToolError>> + Send + '_>> {
        Box::pin(async move {
            let client = self.pool.acquire(&self.server_config).await.map_err(ToolError::Connection)?;
            let result = client.call_tool(&self.name, arguments).await;
            self.pool.release(&self.server_config).await;
            result.map_err(ToolError::Protocol)
        })
    }
}

/// Registry of tools available to an agent.
///
/// Holds tools as `Arc<dyn ToolDyn>` keyed by name, plus the argument shape
/// synthesized from each tool's schema so arguments can be validated before
/// the call reaches the tool server.
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn ToolDyn>>,
    shapes: HashMap<String, ArgShape>,
}

impl ToolRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool, synthesizing its argument shape from its schema.
    /// Overwrites any existing tool with the same name.
    pub fn register(&mut self, tool: Arc<dyn ToolDyn>) {
        let shape = ArgShape::from_schema(tool.input_schema());
        self.shapes.insert(tool.name().to_string(), shape);
        self.tools.insert(tool.name().to_string(), tool);
    }

    /// Discover every tool from a tool-server and register it, backed by a
    /// pooled connection to that server.
    pub async fn register_mcp_server(
        &mut self,
        server_config: McpServerConfig,
        pool: Arc<ConnectionPool>,
    ) -> Result<usize, ToolError> {
        let client = pool.acquire(&server_config).await.map_err(ToolError::Connection)?;
        let discovered = client.list_tools().await.map_err(ToolError::Protocol)?;
        pool.release(&server_config).await;

        let count = discovered.len();
        for tool in discovered {
            self.register(Arc::new(McpToolHandle::new(tool, server_config.clone(), Arc::clone(&pool))));
        }
        tracing::info!(command = %server_config.command, count, "registered tools from server");
        Ok(count)
    }

    /// Look up a tool by name.
    pub fn get(&self, name: &str) -> Option<&Arc<dyn ToolDyn>> {
        self.tools.get(name)
    }

    /// Validate `arguments` against the tool's synthesized shape, then call it.
    pub async fn call(&self, name: &str, arguments: Value) -> Result<Value, ToolError> {
        let tool = self.get(name).ok_or_else(|| ToolError::InvalidArguments {
            tool: name.to_string(),
            message: "no such tool registered".to_string(),
        })?;
        if let Some(shape) = self.shapes.get(name) {
            shape.validate(name, &arguments)?;
        }
        tool.call(arguments).await
    }

    /// Iterate over all registered tools.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn ToolDyn>> {
        self.tools.values()
    }

    /// Number of registered tools.
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn _assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn tool_dyn_is_object_safe() {
        _assert_send_sync::<Arc<dyn ToolDyn>>();
    }

    struct EchoTool {
        schema: Value,
    }

    impl ToolDyn for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }
        fn description(&self) -> &str {
            "echoes its input"
        }
        fn input_schema(&self) -> &Value {
            &self.schema
        }
        fn call(&self, arguments: Value) -> Pin<Box<dyn Future<Output = Result<Value, ToolError>> + Send + '_>> {
            Box::pin(async move { Ok(json!({ "echoed": arguments })) })
        }
    }

    #[tokio::test]
    async fn registry_validates_before_calling() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool {
            schema: json!({
                "type": "object",
                "properties": { "text": { "type": "string" } },
                "required": ["text"],
            }),
        }));

        let err = registry.call("echo", json!({})).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments { .. }));

        let ok = registry.call("echo", json!({"text": "hi"})).await.unwrap();
        assert_eq!(ok, json!({"echoed": {"text": "hi"}}));
    }

    #[tokio::test]
    async fn registry_reports_unknown_tool() {
        let registry = ToolRegistry::new();
        let err = registry.call("nope", json!({})).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments { .. }));
    }
}
