//! A minimal stdio JSON-RPC tool server, used only by the end-to-end tests
//! in `tests/` as a real child process to exercise the tool-server client
//! and connection pool against something other than a test double.

use std::io::{BufRead, Write};

use serde_json::{json, Value};

fn main() {
    let stdin = std::io::stdin();
    let mut stdout = std::io::stdout();

    for line in stdin.lock().lines() {
        let Ok(line) = line else { break };
        if line.trim().is_empty() {
            continue;
        }
        let Ok(request): Result<Value, _> = serde_json::from_str(&line) else { continue };

        let method = request.get("method").and_then(Value::as_str).unwrap_or_default();
        let id = request.get("id").cloned();

        let Some(id) = id else {
            // Notification: no response expected.
            continue;
        };

        let result = match method {
            "initialize" => json!({
                "protocolVersion": "2024-11-05",
                "serverInfo": { "name": "echo-tool-server", "version": "0.1.0" },
                "capabilities": {},
            }),
            "tools/list" => json!({
                "tools": [{
                    "name": "echo",
                    "description": "Echoes back its input argument",
                    "inputSchema": {
                        "type": "object",
                        "properties": { "text": { "type": "string" } },
                        "required": ["text"],
                    },
                }],
            }),
            "tools/call" => {
                let text = request
                    .get("params")
                    .and_then(|p| p.get("arguments"))
                    .and_then(|a| a.get("text"))
                    .and_then(Value::as_str)
                    .unwrap_or_default();
                json!({ "content": [{ "type": "text", "text": format!("echo: {text}") }] })
            }
            other => {
                let response = json!({
                    "jsonrpc": "2.0",
                    "id": id,
                    "error": { "code": -32601, "message": format!("method not found: {other}") },
                });
                writeln!(stdout, "{response}").unwrap();
                stdout.flush().unwrap();
                continue;
            }
        };

        let response = json!({ "jsonrpc": "2.0", "id": id, "result": result });
        writeln!(stdout, "{response}").unwrap();
        stdout.flush().unwrap();
    }
}
