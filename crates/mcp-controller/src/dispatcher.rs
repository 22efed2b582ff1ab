use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration as StdDuration, Instant};

use chrono::{Duration as ChronoDuration, Utc};
use indexmap::IndexSet;
use mcp_rollout::{PodSource, ReconcileContext};
use mcp_store::{ObjectStore, StoreEvent};
use tokio::sync::Notify;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::backoff::jittered_backoff;
use crate::events::{is_priority_event, resolve_affected_pools};

struct State {
    queued: IndexSet<String>,
    priority: IndexSet<String>,
    running: IndexSet<String>,
    last_success: HashMap<String, Instant>,
}

impl State {
    fn new() -> Self {
        Self {
            queued: IndexSet::new(),
            priority: IndexSet::new(),
            running: IndexSet::new(),
            last_success: HashMap::new(),
        }
    }
}

/// Per-pool single-flight reconcile dispatcher (component C7).
///
/// Enqueued pool names are deduplicated; at most one reconcile per pool runs
/// at a time, and a successful pass suppresses re-entry for
/// `pool.debounceSeconds` unless the triggering event was flagged priority
/// (see [`crate::events::is_priority_event`]). The object store being
/// synchronous, reconciles run on a blocking-pool thread — every call may
/// block per §5.
pub struct Dispatcher {
    store: Arc<dyn ObjectStore>,
    pods: Arc<dyn PodSource + Send + Sync>,
    drain_timeout: ChronoDuration,
    eviction_grace: ChronoDuration,
    state: Mutex<State>,
    notify: Notify,
}

impl Dispatcher {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        pods: Arc<dyn PodSource + Send + Sync>,
        drain_timeout: ChronoDuration,
        eviction_grace: ChronoDuration,
    ) -> Self {
        Self {
            store,
            pods,
            drain_timeout,
            eviction_grace,
            state: Mutex::new(State::new()),
            notify: Notify::new(),
        }
    }

    /// Resolves a store change notification to its affected pools and
    /// enqueues each one.
    pub fn handle_store_event(&self, event: &StoreEvent) {
        let priority = is_priority_event(event);
        match resolve_affected_pools(self.store.as_ref(), event) {
            Ok(pools) => {
                for pool_name in pools {
                    self.enqueue_pool(pool_name, priority);
                }
            }
            Err(err) => warn!(error = %err, "failed to resolve affected pools for store event"),
        }
    }

    /// Directly enqueues a single pool by name, bypassing event resolution —
    /// used for external callers (a CLI trigger, a test) and for retry
    /// rescheduling.
    pub fn enqueue_pool(&self, pool_name: impl Into<String>, priority: bool) {
        let pool_name = pool_name.into();
        let mut state = self.state.lock().unwrap();
        if priority {
            state.priority.insert(pool_name.clone());
        }
        state.queued.insert(pool_name);
        drop(state);
        self.notify.notify_one();
    }

    /// Moves every queued pool that is neither already running nor inside
    /// its debounce window into "ready", marking it running and returning
    /// its name.
    fn take_ready(&self) -> Vec<String> {
        let mut state = self.state.lock().unwrap();
        let now = Instant::now();
        let queued = std::mem::take(&mut state.queued);

        let mut ready = Vec::new();
        for name in queued {
            if state.running.contains(&name) {
                state.queued.insert(name); // still in flight, re-check later
                continue;
            }

            let is_priority = state.priority.contains(&name);
            let debounce_seconds = self
                .store
                .get_pool(&name)
                .ok()
                .flatten()
                .map(|p| p.value.spec.debounce_seconds)
                .unwrap_or(mcp_types::DEFAULT_DEBOUNCE_SECONDS);

            let within_debounce = state
                .last_success
                .get(&name)
                .is_some_and(|last| now.duration_since(*last) < StdDuration::from_secs(debounce_seconds));

            if within_debounce && !is_priority {
                state.queued.insert(name);
                continue;
            }

            state.running.insert(name.clone());
            state.priority.swap_remove(&name);
            ready.push(name);
        }
        ready
    }

    fn finish(&self, pool_name: &str, succeeded: bool) {
        let mut state = self.state.lock().unwrap();
        state.running.swap_remove(pool_name);
        if succeeded {
            state.last_success.insert(pool_name.to_string(), Instant::now());
        }
    }

    /// Runs one reconcile pass for `pool_name` on a blocking-pool thread.
    async fn reconcile_one(self: Arc<Self>, pool_name: String, attempt: u32) {
        let store = self.store.clone();
        let pods = self.pods.clone();
        let drain_timeout = self.drain_timeout;
        let eviction_grace = self.eviction_grace;
        let name_for_ctx = pool_name.clone();

        let result = tokio::task::spawn_blocking(move || {
            let ctx = ReconcileContext {
                now: Utc::now(),
                drain_timeout,
                eviction_grace,
                pods: pods.as_ref(),
            };
            mcp_rollout::reconcile_pool(store.as_ref(), &name_for_ctx, &ctx)
        })
        .await;

        match result {
            Ok(Ok(report)) => {
                info!(
                    pool = %pool_name,
                    revision = %report.target_revision_name,
                    admitted = report.admitted.len(),
                    "reconcile pass complete"
                );
                self.finish(&pool_name, true);
            }
            Ok(Err(err)) => {
                warn!(pool = %pool_name, error = %err, attempt, "reconcile pass failed, scheduling retry");
                self.finish(&pool_name, false);
                self.schedule_retry(pool_name, attempt + 1);
            }
            Err(join_err) => {
                warn!(pool = %pool_name, error = %join_err, "reconcile task panicked, scheduling retry");
                self.finish(&pool_name, false);
                self.schedule_retry(pool_name, attempt + 1);
            }
        }
    }

    fn schedule_retry(self: &Arc<Self>, pool_name: String, attempt: u32) {
        let delay = jittered_backoff(&pool_name, attempt);
        let dispatcher = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            dispatcher.enqueue_pool(pool_name, true);
        });
    }

    /// Drives the dispatcher until cancelled: drains ready pools into
    /// parallel reconcile tasks (distinct pools run concurrently; the same
    /// pool never runs twice at once) and wakes on new events or a 500ms
    /// debounce-expiry tick, whichever comes first.
    pub async fn run(self: Arc<Self>, cancel: tokio_util::sync::CancellationToken) {
        let mut tasks: JoinSet<()> = JoinSet::new();
        loop {
            for pool_name in self.take_ready() {
                let dispatcher = self.clone();
                tasks.spawn(async move { dispatcher.reconcile_one(pool_name, 0).await });
            }

            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("dispatcher cancelled, draining in-flight reconciles");
                    while tasks.join_next().await.is_some() {}
                    return;
                }
                _ = self.notify.notified() => {}
                _ = tokio::time::sleep(StdDuration::from_millis(500)) => {}
                Some(_) = tasks.join_next(), if !tasks.is_empty() => {}
            }
        }
    }
}
