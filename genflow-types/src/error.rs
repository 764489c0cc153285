//! Shared error kinds. Each crate that needs a protocol-specific error
//! wraps or re-exports one of these; see SPEC_FULL.md §7 for which crate
//! raises which kind.

use thiserror::Error;

/// Workflow validation errors, raised at `create_workflow` time.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ValidationError {
    /// Two tasks in the same workflow share an id.
    #[error("duplicate task id: {0}")]
    DuplicateTaskId(String),

    /// A task depends on an id that does not exist in the workflow.
    #[error("task {task} depends on non-existent task {dependency}")]
    UnknownDependency {
        /// The task declaring the dependency.
        task: String,
        /// The missing dependency id.
        dependency: String,
    },

    /// The dependency graph contains a cycle.
    #[error("cycle detected in workflow dependencies")]
    Cycle,
}

/// Tool-server connection errors (spawn, handshake, invalid config).
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ConnectionError {
    /// The server command/args failed basic shape validation.
    #[error("invalid tool-server configuration: {0}")]
    Configuration(String),

    /// The child process could not be spawned.
    #[error("failed to spawn tool-server process: {0}")]
    Spawn(String),

    /// The initialize/initialized handshake failed.
    #[error("tool-server handshake failed: {0}")]
    Handshake(String),
}

/// Tool-server protocol errors (bad JSON, server-reported error, timeout).
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The server's stdout did not produce valid JSON-RPC within the timeout.
    #[error("tool-server request timed out after {0}s")]
    Timeout(u64),

    /// The server's response line was not valid JSON, or was missing fields.
    #[error("malformed tool-server response: {0}")]
    Malformed(String),

    /// The server returned a JSON-RPC `error` member.
    #[error("tool '{tool}' failed: {message}")]
    ServerError {
        /// Name of the tool (or method) the error is about.
        tool: String,
        /// The server-reported message.
        message: String,
    },

    /// The underlying process pipe could not be written to or read from.
    #[error("tool-server I/O error: {0}")]
    Io(String),
}

/// Errors surfaced by a synthesized tool callable to the model.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ToolError {
    /// The caller-supplied arguments did not satisfy the tool's input schema.
    #[error("invalid arguments for tool '{tool}': {message}")]
    InvalidArguments {
        /// The tool name.
        tool: String,
        /// Why validation failed.
        message: String,
    },

    /// The underlying tool-server call failed.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The underlying tool-server connection failed.
    #[error(transparent)]
    Connection(#[from] ConnectionError),
}
