//! Typed ID wrappers for tasks, workflows, and agents.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Typed ID wrappers prevent mixing up task IDs, agent IDs, etc.
/// These are just strings underneath — no UUID enforcement, no format
/// requirement. Callers choose their own identifier scheme.
macro_rules! typed_id {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(Debug, Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            /// Create a new typed ID from anything that converts to `String`.
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Borrow the inner string.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_owned())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }
    };
}

typed_id!(TaskId, "Unique identifier for a task within a workflow.");
typed_id!(AgentId, "Unique identifier for an agent.");
typed_id!(WorkflowId, "Unique identifier for a workflow definition.");

/// Sentinel recipient that addresses every registered agent except the sender.
pub const BROADCAST: &str = "*";
