//! Stable duration type for timeouts, serializing as seconds.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Duration in whole seconds with a stable JSON serialization format.
///
/// Matches how `task.timeout` and `workflow.default_timeout` read in the
/// original workflow definitions: a plain float/int number of seconds, not
/// serde's internal `{"secs": N, "nanos": N}` representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DurationSecs(u64);

impl DurationSecs {
    /// Create from a whole number of seconds.
    pub fn from_secs(secs: u64) -> Self {
        Self(secs)
    }

    /// Get the value in seconds.
    pub fn as_secs(&self) -> u64 {
        self.0
    }

    /// Convert to `std::time::Duration`.
    pub fn to_std(self) -> Duration {
        Duration::from_secs(self.0)
    }
}

impl From<Duration> for DurationSecs {
    fn from(d: Duration) -> Self {
        Self(d.as_secs())
    }
}

impl From<DurationSecs> for Duration {
    fn from(d: DurationSecs) -> Self {
        Duration::from_secs(d.0)
    }
}

impl fmt::Display for DurationSecs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}s", self.0)
    }
}

use std::fmt;
