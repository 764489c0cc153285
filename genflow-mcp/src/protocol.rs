//! JSON-RPC 2.0 wire types for the tool-server protocol: `initialize`,
//! `tools/list`, and `tools/call`, exchanged as newline-delimited JSON over
//! the child process's stdin/stdout.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Protocol version advertised during the `initialize` handshake.
pub const PROTOCOL_VERSION: &str = "2024-11-05";

#[derive(Debug, Serialize)]
pub(crate) struct Request {
    pub jsonrpc: &'static str,
    pub id: u64,
    pub method: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl Request {
    pub fn new(id: u64, method: &'static str, params: Option<Value>) -> Self {
        Self { jsonrpc: "2.0", id, method, params }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct Notification {
    pub jsonrpc: &'static str,
    pub method: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Response {
    #[allow(dead_code)]
    pub jsonrpc: Option<String>,
    #[allow(dead_code)]
    pub id: Option<Value>,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<ResponseError>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ResponseError {
    #[allow(dead_code)]
    pub code: i64,
    pub message: String,
}

/// A tool advertised by a connected tool server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpTool {
    /// Tool name, as passed to `tools/call`.
    pub name: String,
    /// Human-readable description.
    #[serde(default)]
    pub description: String,
    /// JSON Schema describing the tool's arguments.
    #[serde(rename = "inputSchema", default)]
    pub input_schema: Value,
}

pub(crate) fn initialize_params() -> Value {
    serde_json::json!({
        "protocolVersion": PROTOCOL_VERSION,
        "capabilities": { "tools": {} },
        "clientInfo": { "name": "genflow", "version": env!("CARGO_PKG_VERSION") },
    })
}
