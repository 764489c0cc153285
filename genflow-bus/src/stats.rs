//! Bus-wide statistics.

use std::collections::HashMap;

/// A point-in-time snapshot of the bus's counters and occupancy.
#[derive(Debug, Clone, Default)]
pub struct BusStats {
    /// Total messages accepted onto the global ingress queue.
    pub messages_sent: u64,
    /// Total messages successfully placed in a recipient's queue.
    pub messages_delivered: u64,
    /// Total messages that could not be delivered (unknown recipient, full
    /// queue) or rejected at send time.
    pub messages_failed: u64,
    /// Currently registered agent ids.
    pub registered_agents: usize,
    /// Currently registered handlers.
    pub active_handlers: usize,
    /// Buffered message count per agent id.
    pub queue_sizes: HashMap<String, usize>,
}
