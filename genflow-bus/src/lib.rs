//! In-process publish/subscribe message bus for inter-agent communication.
//!
//! | module | responsibility |
//! |---|---|
//! | [`bus`] | routing, subscriptions, stats, history |
//! | [`queue`] | per-recipient bounded mailbox |
//! | [`history`] | bounded append log shared by queues and the bus |
//! | [`handler`] | subscription callback table |
//! | [`stats`] | point-in-time counters snapshot |
//! | [`handle`] | per-agent façade over [`Bus`] |

mod bus;
mod handle;
mod handler;
mod history;
mod queue;
mod stats;

pub use bus::Bus;
pub use handle::BusHandle;
pub use handler::{HandlerFn, MessageHandler};
pub use history::History;
pub use queue::RecipientQueue;
pub use stats::BusStats;
