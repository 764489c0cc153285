//! Tool registry: binds tool-server tools to typed, validated callables an
//! agent can invoke by name.

pub mod registry;
pub mod schema;

pub use registry::{McpToolHandle, ToolDyn, ToolRegistry};
pub use schema::{ArgKind, ArgShape, ArgSpec};
