use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// What the on-node agent last reported about applying its assigned revision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AgentState {
    Done,
    Applying,
    Degraded,
}

impl fmt::Display for AgentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Done => "done",
            Self::Applying => "applying",
            Self::Degraded => "degraded",
        })
    }
}

impl FromStr for AgentState {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "done" => Ok(Self::Done),
            "applying" => Ok(Self::Applying),
            "degraded" => Ok(Self::Degraded),
            _ => Err(()),
        }
    }
}

const KEY_POOL: &str = "pool";
const KEY_DESIRED_REVISION: &str = "desired-revision";
const KEY_DESIRED_REVISION_SET_AT: &str = "desired-revision-set-at";
const KEY_CURRENT_REVISION: &str = "current-revision";
const KEY_AGENT_STATE: &str = "agent-state";
const KEY_CORDONED: &str = "cordoned";
const KEY_DRAIN_STARTED_AT: &str = "drain-started-at";
const KEY_DRAIN_RETRY_COUNT: &str = "drain-retry-count";
const KEY_LAST_REBOOT_REQUIRED_AT: &str = "last-reboot-required-at";

/// Typed view over a node's fixed controller/agent annotation namespace.
///
/// Wraps the raw string-valued map so callers never hand-roll the annotation
/// keys in §6 of the spec. Controller-owned keys (`pool`, `desired-revision`,
/// `desired-revision-set-at`, `cordoned`, `drain-started-at`,
/// `drain-retry-count`) have setters here; agent-owned keys (`current-revision`,
/// `agent-state`) are read-only from the controller's point of view.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeAnnotations(IndexMap<String, String>);

impl NodeAnnotations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Access to the raw map, for serialization or storage-layer plumbing.
    pub fn raw(&self) -> &IndexMap<String, String> {
        &self.0
    }

    pub fn pool(&self) -> Option<&str> {
        self.0.get(KEY_POOL).map(String::as_str)
    }

    pub fn set_pool(&mut self, pool: &str) {
        self.0.insert(KEY_POOL.to_string(), pool.to_string());
    }

    pub fn clear_pool(&mut self) {
        self.0.shift_remove(KEY_POOL);
    }

    pub fn desired_revision(&self) -> Option<&str> {
        self.0.get(KEY_DESIRED_REVISION).map(String::as_str)
    }

    pub fn set_desired_revision(&mut self, revision: &str, at: DateTime<Utc>) {
        self.0
            .insert(KEY_DESIRED_REVISION.to_string(), revision.to_string());
        self.0
            .insert(KEY_DESIRED_REVISION_SET_AT.to_string(), at.to_rfc3339());
    }

    pub fn desired_revision_set_at(&self) -> Option<DateTime<Utc>> {
        self.0
            .get(KEY_DESIRED_REVISION_SET_AT)
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc))
    }

    pub fn current_revision(&self) -> Option<&str> {
        self.0.get(KEY_CURRENT_REVISION).map(String::as_str)
    }

    pub fn agent_state(&self) -> Option<AgentState> {
        self.0.get(KEY_AGENT_STATE).and_then(|s| s.parse().ok())
    }

    /// Simulates the on-node agent reporting its apply state. The real agent
    /// writes `current-revision`/`agent-state` out of band; the controller
    /// never does — this setter exists for fixtures in downstream crates'
    /// tests that need to drive a node through the agent side of the
    /// handshake.
    pub fn simulate_agent_report(&mut self, current_revision: &str, state: AgentState) {
        self.0
            .insert(KEY_CURRENT_REVISION.to_string(), current_revision.to_string());
        self.0.insert(KEY_AGENT_STATE.to_string(), state.to_string());
    }

    pub fn is_cordoned_by_controller(&self) -> bool {
        self.0.get(KEY_CORDONED).map(String::as_str) == Some("true")
    }

    pub fn set_cordoned(&mut self) {
        self.0.insert(KEY_CORDONED.to_string(), "true".to_string());
    }

    pub fn drain_started_at(&self) -> Option<DateTime<Utc>> {
        self.0
            .get(KEY_DRAIN_STARTED_AT)
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc))
    }

    pub fn set_drain_started_at(&mut self, at: DateTime<Utc>) {
        self.0
            .insert(KEY_DRAIN_STARTED_AT.to_string(), at.to_rfc3339());
    }

    pub fn drain_retry_count(&self) -> u32 {
        self.0
            .get(KEY_DRAIN_RETRY_COUNT)
            .and_then(|s| s.parse().ok())
            .unwrap_or(0)
    }

    pub fn set_drain_retry_count(&mut self, count: u32) {
        self.0
            .insert(KEY_DRAIN_RETRY_COUNT.to_string(), count.to_string());
    }

    /// When this node was last assigned a revision on a pass where the
    /// reboot determiner required a reboot — the `minIntervalSeconds`
    /// spacing clock. Not part of the fixed annotation namespace in §6;
    /// added to carry the `reboot.minIntervalSeconds` enforcement.
    pub fn last_reboot_required_at(&self) -> Option<DateTime<Utc>> {
        self.0
            .get(KEY_LAST_REBOOT_REQUIRED_AT)
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc))
    }

    pub fn set_last_reboot_required_at(&mut self, at: DateTime<Utc>) {
        self.0
            .insert(KEY_LAST_REBOOT_REQUIRED_AT.to_string(), at.to_rfc3339());
    }

    /// Clears the controller's cordon bookkeeping on uncordon, per the
    /// annotation hygiene rule in §4.5: `current-revision`, `desired-revision`,
    /// `agent-state`, and `pool` are preserved.
    pub fn clear_cordon_bookkeeping(&mut self) {
        self.0.shift_remove(KEY_CORDONED);
        self.0.shift_remove(KEY_DRAIN_STARTED_AT);
        self.0.shift_remove(KEY_DRAIN_RETRY_COUNT);
    }
}

/// A fleet member node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub name: String,
    #[serde(default)]
    pub labels: IndexMap<String, String>,
    #[serde(default)]
    pub annotations: NodeAnnotations,
    pub unschedulable: bool,
}

impl Node {
    /// A node is converged when the agent has fully applied the revision the
    /// controller last assigned it.
    pub fn is_converged(&self) -> bool {
        match (
            self.annotations.current_revision(),
            self.annotations.desired_revision(),
            self.annotations.agent_state(),
        ) {
            (Some(current), Some(desired), Some(AgentState::Done)) => current == desired,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uncordon_preserves_agent_and_pool_annotations() {
        let mut ann = NodeAnnotations::new();
        ann.set_pool("workers");
        ann.set_cordoned();
        ann.set_drain_started_at(Utc::now());
        ann.set_drain_retry_count(2);
        ann.set_desired_revision("rendered-workers-abc1234567", Utc::now());

        ann.clear_cordon_bookkeeping();

        assert_eq!(ann.pool(), Some("workers"));
        assert_eq!(ann.desired_revision(), Some("rendered-workers-abc1234567"));
        assert!(!ann.is_cordoned_by_controller());
        assert!(ann.drain_started_at().is_none());
        assert_eq!(ann.drain_retry_count(), 0);
    }

    #[test]
    fn converged_requires_matching_revisions_and_done_state() {
        let mut ann = NodeAnnotations::new();
        ann.set_desired_revision("rev-a", Utc::now());
        let node = Node {
            name: "n1".into(),
            labels: IndexMap::new(),
            annotations: ann.clone(),
            unschedulable: false,
        };
        assert!(!node.is_converged());

        ann.0.insert("current-revision".into(), "rev-a".into());
        ann.0.insert("agent-state".into(), "done".into());
        let node = Node {
            annotations: ann,
            ..node
        };
        assert!(node.is_converged());
    }
}
