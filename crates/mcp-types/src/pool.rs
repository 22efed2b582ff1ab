use std::str::FromStr;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::condition::Condition;
use crate::selector::LabelSelector;

/// A rollout budget, either an absolute node count or a percentage of the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MaxUnavailable {
    Count(u32),
    Percent(u32),
}

/// Error returned when a `maxUnavailable` string is neither a bare integer
/// nor a `"<integer>%"` percentage.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid maxUnavailable value: {0:?}")]
pub struct MaxUnavailableParseError(pub String);

impl FromStr for MaxUnavailable {
    type Err = MaxUnavailableParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(digits) = s.strip_suffix('%') {
            digits
                .parse::<u32>()
                .map(MaxUnavailable::Percent)
                .map_err(|_| MaxUnavailableParseError(s.to_string()))
        } else {
            s.parse::<u32>()
                .map(MaxUnavailable::Count)
                .map_err(|_| MaxUnavailableParseError(s.to_string()))
        }
    }
}

/// Reboot gating strategy for a pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RebootStrategy {
    Never,
    IfRequired,
    Always,
}

/// A pool's reboot policy: the gating strategy plus a minimum spacing
/// between reboot-requiring passes for any one node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RebootPolicy {
    pub strategy: RebootStrategy,
    pub min_interval_seconds: u64,
}

/// The default debounce window between successful reconcile passes.
pub const DEFAULT_DEBOUNCE_SECONDS: u64 = 30;

/// Pool spec: node selection and rollout policy, authored externally.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolSpec {
    pub node_selector: LabelSelector,
    #[serde(default)]
    pub paused: bool,
    pub max_unavailable: MaxUnavailable,
    #[serde(default)]
    pub apply_timeout_seconds: u64,
    pub reboot: RebootPolicy,
    #[serde(default = "default_debounce_seconds")]
    pub debounce_seconds: u64,
}

fn default_debounce_seconds() -> u64 {
    DEFAULT_DEBOUNCE_SECONDS
}

/// Pool status: the only part of a pool the controller mutates.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PoolStatus {
    pub machine_count: u32,
    pub updated_machine_count: u32,
    pub ready_machine_count: u32,
    pub updating_machine_count: u32,
    pub degraded_machine_count: u32,
    pub target_revision: Option<String>,
    #[serde(default)]
    pub conditions: Vec<Condition>,
}

/// A named pool: spec authored externally, status owned by the controller.
///
/// `labels` is what fragment `labelSelector`s match against — a fragment is
/// selected into a pool the same way a pool's `nodeSelector` is matched
/// against node labels, just one level up.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pool {
    pub name: String,
    #[serde(default)]
    pub labels: IndexMap<String, String>,
    pub spec: PoolSpec,
    #[serde(default)]
    pub status: PoolStatus,
}
