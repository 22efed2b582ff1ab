//! Per-pool reconcile dispatcher (component C7): turns object-store change
//! events into debounced, single-flight, retrying reconcile passes over
//! [`mcp_rollout::reconcile_pool`].

mod backoff;
mod dispatcher;
mod events;

pub use backoff::jittered_backoff;
pub use dispatcher::Dispatcher;
pub use events::{default_debounce_seconds, is_priority_event, resolve_affected_pools};
