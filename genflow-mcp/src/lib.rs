//! Tool-server client and connection pool.
//!
//! A tool server is a child process speaking JSON-RPC 2.0 over
//! newline-delimited stdio, following the `initialize` /
//! `notifications/initialized` / `tools/list` / `tools/call` method set.
//! [`McpClient`] owns one such connection; [`ConnectionPool`] keys clients by
//! a deterministic fingerprint of their configuration so repeated requests
//! for the same server reuse one process instead of spawning a new one.

pub mod client;
pub mod config;
pub mod pool;
pub mod protocol;

pub use client::McpClient;
pub use config::McpServerConfig;
pub use pool::{ConnectionPool, PoolInfo};
pub use protocol::McpTool;
