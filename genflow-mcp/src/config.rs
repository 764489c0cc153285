//! Tool-server connection configuration and fingerprinting.

use std::collections::BTreeMap;

use genflow_types::DurationSecs;

/// Default per-request timeout used when a config does not override one.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Configuration for launching and talking to one tool-server process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct McpServerConfig {
    /// Executable to spawn.
    pub command: String,
    /// Arguments passed to the executable.
    pub args: Vec<String>,
    /// Extra environment variables, merged on top of the parent process's
    /// environment.
    pub env: BTreeMap<String, String>,
    /// How long to wait for a single request's response before timing out.
    pub timeout: DurationSecs,
}

impl McpServerConfig {
    /// Build a config with no args, no extra env, and the default timeout.
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            args: Vec::new(),
            env: BTreeMap::new(),
            timeout: DurationSecs::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }

    /// Set the argument list, consuming and returning `self`.
    pub fn with_args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Add one environment variable, consuming and returning `self`.
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Override the request timeout, consuming and returning `self`.
    pub fn with_timeout(mut self, timeout: DurationSecs) -> Self {
        self.timeout = timeout;
        self
    }

    /// A key that uniquely identifies this server configuration for pooling
    /// purposes: the command, its args in order, then `key=value` env pairs
    /// in sorted order (`env` is already a `BTreeMap`, so iteration order is
    /// deterministic). Two configs that differ only in `timeout` share a key,
    /// since the timeout does not affect which process would be spawned.
    pub fn fingerprint(&self) -> String {
        let mut parts = Vec::with_capacity(1 + self.args.len() + self.env.len());
        parts.push(self.command.clone());
        parts.extend(self.args.iter().cloned());
        parts.extend(self.env.iter().map(|(k, v)| format!("{k}={v}")));
        parts.join("|")
    }
}
