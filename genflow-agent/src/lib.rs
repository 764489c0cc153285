//! The Agent contract: binds a configuration to an `execute` call, plus the
//! lifecycle and message-handling scaffolding the scheduler and bus rely on.

pub mod agent;
pub mod config;
pub mod factory;
pub mod model;
pub mod runtime;

pub use agent::{Agent, ModelAgent};
pub use config::{AgentConfig, ExecutionContext};
pub use factory::AgentFactory;
pub use model::{ModelOutput, ModelProvider};
pub use runtime::{AgentRuntime, MessageHandler};
