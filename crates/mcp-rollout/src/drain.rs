use chrono::{DateTime, Duration, Utc};

/// A workload pod observed on a node, as reported by the external pod API
/// (out of scope for this core — the driver only reasons about the subset
/// of pod state that determines evictability).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pod {
    pub name: String,
    pub owner_kind: Option<String>,
    pub mirror: bool,
    pub terminated: bool,
    pub eviction_requested_at: Option<DateTime<Utc>>,
}

impl Pod {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            owner_kind: None,
            mirror: false,
            terminated: false,
            eviction_requested_at: None,
        }
    }

    pub fn daemonset(name: impl Into<String>) -> Self {
        Self {
            owner_kind: Some("DaemonSet".to_string()),
            ..Self::new(name)
        }
    }

    /// A pod is evictable unless it's owned by a DaemonSet, is a mirror/
    /// static pod, or has already terminated (§4.5).
    pub fn is_evictable(&self) -> bool {
        !self.terminated && !self.mirror && self.owner_kind.as_deref() != Some("DaemonSet")
    }
}

/// The driver's plan for one drain pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrainOutcome {
    /// True iff no evictable pod remains present on the node at all — the
    /// `evictablePodsOnNode = ∅` condition that advances Draining → Assigning.
    pub complete: bool,
    /// Evictable pod names to (re)request eviction for this pass.
    pub to_request: Vec<String>,
}

/// Capability the driver needs to observe the pods scheduled on a node, kept
/// separate from [`mcp_store::ObjectStore`] since pods aren't one of this
/// core's object kinds (§6) — just state the drain algorithm reasons about.
pub trait PodSource {
    fn pods_on_node(&self, node_name: &str) -> Vec<Pod>;
}

/// Plans one drain pass over `pods` currently observed on a node.
///
/// A pod whose eviction was requested less than `eviction_grace` ago is
/// still within its grace window and is not re-requested this pass (the
/// supplemented eviction-grace behavior); once the grace period elapses and
/// the pod is still present, it's requested again, which models the
/// exponential-backoff retry the caller drives via `drain-retry-count`.
pub fn plan_drain(pods: &[Pod], now: DateTime<Utc>, eviction_grace: Duration) -> DrainOutcome {
    let evictable: Vec<&Pod> = pods.iter().filter(|p| p.is_evictable()).collect();
    let complete = evictable.is_empty();

    let mut to_request: Vec<String> = evictable
        .into_iter()
        .filter(|pod| match pod.eviction_requested_at {
            None => true,
            Some(requested_at) => now.signed_duration_since(requested_at) >= eviction_grace,
        })
        .map(|pod| pod.name.clone())
        .collect();
    to_request.sort();

    DrainOutcome { complete, to_request }
}
