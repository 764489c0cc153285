//! A single connection to a tool-server process, speaking JSON-RPC 2.0 over
//! newline-delimited stdio.

use std::process::Stdio;
use std::time::Duration;

use genflow_types::{ConnectionError, ProtocolError};
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::Mutex;

use crate::config::McpServerConfig;
use crate::protocol::{initialize_params, McpTool, Notification, Request, Response};

/// How long `disconnect` waits for the child to exit on its own, after
/// closing its stdin, before force-killing it.
const DISCONNECT_GRACE_PERIOD: Duration = Duration::from_secs(2);

struct Connected {
    child: Child,
    stdin: ChildStdin,
    lines: Lines<BufReader<ChildStdout>>,
    next_id: u64,
    tools: Option<Vec<McpTool>>,
}

enum State {
    Disconnected,
    Connected(Connected),
}

/// A client for one tool-server process.
///
/// Only one request may be outstanding at a time: `connect`, `list_tools`,
/// and `call_tool` all take the same internal lock for their full
/// request/response round trip, matching the single-outstanding-request
/// discipline tool servers are built to expect.
pub struct McpClient {
    config: McpServerConfig,
    state: Mutex<State>,
}

impl McpClient {
    /// Build a client for `config`. Does not spawn anything yet; the
    /// process starts on the first call to [`connect`](Self::connect) (or
    /// implicitly, the first call to [`list_tools`](Self::list_tools) or
    /// [`call_tool`](Self::call_tool)).
    pub fn new(config: McpServerConfig) -> Self {
        Self { config, state: Mutex::new(State::Disconnected) }
    }

    /// The configuration this client was built from.
    pub fn config(&self) -> &McpServerConfig {
        &self.config
    }

    /// Spawn the tool-server process and perform the initialize/initialized
    /// handshake. A no-op if already connected.
    pub async fn connect(&self) -> Result<(), ConnectionError> {
        let mut state = self.state.lock().await;
        if matches!(*state, State::Connected(_)) {
            return Ok(());
        }

        if self.config.command.is_empty() {
            return Err(ConnectionError::Configuration("tool-server command must not be empty".into()));
        }

        let mut command = Command::new(&self.config.command);
        command
            .args(&self.config.args)
            .envs(&self.config.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        let mut child = command.spawn().map_err(|e| ConnectionError::Spawn(e.to_string()))?;
        let stdin = child.stdin.take().ok_or_else(|| ConnectionError::Spawn("no stdin pipe".into()))?;
        let stdout = child.stdout.take().ok_or_else(|| ConnectionError::Spawn("no stdout pipe".into()))?;
        let lines = BufReader::new(stdout).lines();

        let mut connected = Connected { child, stdin, lines, next_id: 0, tools: None };

        let id = Self::next_id(&mut connected);
        let request = Request::new(id, "initialize", Some(initialize_params()));
        let response = Self::roundtrip(&mut connected, request, self.config.timeout.to_std())
            .await
            .map_err(|e| ConnectionError::Handshake(e.to_string()))?;
        if let Some(error) = response.error {
            return Err(ConnectionError::Handshake(error.message));
        }

        let notification = Notification { jsonrpc: "2.0", method: "notifications/initialized", params: None };
        Self::send(&mut connected, &notification)
            .await
            .map_err(|e| ConnectionError::Handshake(e.to_string()))?;

        tracing::info!(command = %self.config.command, "connected to tool server");
        *state = State::Connected(connected);
        Ok(())
    }

    /// Disconnect the child process: close its stdin so it can exit on its
    /// own, then force-kill it if it's still alive after
    /// [`DISCONNECT_GRACE_PERIOD`]. A no-op if already disconnected.
    pub async fn disconnect(&self) {
        let mut state = self.state.lock().await;
        if let State::Connected(connected) = std::mem::replace(&mut *state, State::Disconnected) {
            let Connected { mut child, stdin, .. } = connected;
            drop(stdin);

            match tokio::time::timeout(DISCONNECT_GRACE_PERIOD, child.wait()).await {
                Ok(_) => tracing::debug!(command = %self.config.command, "tool server exited gracefully"),
                Err(_) => {
                    tracing::warn!(command = %self.config.command, "tool server did not exit within grace period, killing");
                    let _ = child.start_kill();
                    let _ = child.wait().await;
                }
            }
        }
    }

    /// Whether the underlying process is currently connected.
    pub async fn is_connected(&self) -> bool {
        matches!(*self.state.lock().await, State::Connected(_))
    }

    /// List the tools this server advertises, connecting first if needed.
    /// The result is cached after the first successful call.
    pub async fn list_tools(&self) -> Result<Vec<McpTool>, ProtocolError> {
        self.ensure_connected().await?;

        let mut state = self.state.lock().await;
        let connected = Self::require_connected(&mut state)?;
        if let Some(tools) = &connected.tools {
            return Ok(tools.clone());
        }

        let id = Self::next_id(connected);
        let request = Request::new(id, "tools/list", None);
        let response = Self::roundtrip(connected, request, self.config.timeout.to_std()).await?;
        if let Some(error) = response.error {
            return Err(ProtocolError::ServerError { tool: "tools/list".into(), message: error.message });
        }

        let tools: Vec<McpTool> = response
            .result
            .and_then(|r| r.get("tools").cloned())
            .map(serde_json::from_value)
            .transpose()
            .map_err(|e| ProtocolError::Malformed(e.to_string()))?
            .unwrap_or_default();

        connected.tools = Some(tools.clone());
        Ok(tools)
    }

    /// Call a tool by name, connecting first if needed.
    ///
    /// Text content blocks in the server's response are concatenated with
    /// `\n` and returned as a JSON string, matching how a model expects a
    /// tool call's output to read; any other result shape is returned
    /// verbatim.
    pub async fn call_tool(&self, name: &str, arguments: Value) -> Result<Value, ProtocolError> {
        self.ensure_connected().await?;

        let mut state = self.state.lock().await;
        let connected = Self::require_connected(&mut state)?;

        let id = Self::next_id(connected);
        let params = serde_json::json!({ "name": name, "arguments": arguments });
        let request = Request::new(id, "tools/call", Some(params));
        let response = Self::roundtrip(connected, request, self.config.timeout.to_std()).await?;
        if let Some(error) = response.error {
            return Err(ProtocolError::ServerError { tool: name.to_string(), message: error.message });
        }

        let result = response.result.unwrap_or(Value::Null);
        Ok(extract_text_content(result))
    }

    async fn ensure_connected(&self) -> Result<(), ProtocolError> {
        if self.is_connected().await {
            return Ok(());
        }
        self.connect().await.map_err(|e| ProtocolError::Io(e.to_string()))
    }

    fn require_connected(state: &mut State) -> Result<&mut Connected, ProtocolError> {
        match state {
            State::Connected(c) => Ok(c),
            State::Disconnected => Err(ProtocolError::Io("tool-server process not available".into())),
        }
    }

    fn next_id(connected: &mut Connected) -> u64 {
        connected.next_id += 1;
        connected.next_id
    }

    async fn send(connected: &mut Connected, notification: &Notification) -> Result<(), ProtocolError> {
        let mut line = serde_json::to_string(notification).map_err(|e| ProtocolError::Malformed(e.to_string()))?;
        line.push('\n');
        connected.stdin.write_all(line.as_bytes()).await.map_err(|e| ProtocolError::Io(e.to_string()))?;
        connected.stdin.flush().await.map_err(|e| ProtocolError::Io(e.to_string()))
    }

    async fn roundtrip(
        connected: &mut Connected,
        request: Request,
        timeout: std::time::Duration,
    ) -> Result<Response, ProtocolError> {
        let mut line = serde_json::to_string(&request).map_err(|e| ProtocolError::Malformed(e.to_string()))?;
        line.push('\n');
        connected.stdin.write_all(line.as_bytes()).await.map_err(|e| ProtocolError::Io(e.to_string()))?;
        connected.stdin.flush().await.map_err(|e| ProtocolError::Io(e.to_string()))?;

        let next = connected.lines.next_line();
        let line = tokio::time::timeout(timeout, next)
            .await
            .map_err(|_| ProtocolError::Timeout(timeout.as_secs()))?
            .map_err(|e| ProtocolError::Io(e.to_string()))?
            .ok_or_else(|| ProtocolError::Malformed("tool server closed its output".into()))?;

        serde_json::from_str(&line).map_err(|e| ProtocolError::Malformed(e.to_string()))
    }
}

fn extract_text_content(result: Value) -> Value {
    let Some(content) = result.get("content").and_then(Value::as_array) else {
        return result;
    };

    let text_parts: Vec<&str> = content
        .iter()
        .filter(|item| item.get("type").and_then(Value::as_str) == Some("text"))
        .filter_map(|item| item.get("text").and_then(Value::as_str))
        .collect();

    if text_parts.is_empty() {
        result
    } else {
        Value::String(text_parts.join("\n"))
    }
}
