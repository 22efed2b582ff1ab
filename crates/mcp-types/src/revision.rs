use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::fragment::UnitDesiredState;
use crate::pool::RebootStrategy;

/// A merged file entry in a rendered revision, keyed by path in [`RevisionConfig::files`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    pub content: String,
    pub mode: u32,
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default)]
    pub group: Option<String>,
}

/// A merged unit entry in a rendered revision, keyed by name in [`RevisionConfig::units`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitEntry {
    pub content: String,
    pub desired_state: UnitDesiredState,
}

/// The canonical merged configuration produced by the renderer.
///
/// `files` and `units` are always stored in sorted-key order: this is both
/// the iteration order used for hashing and the order serialized to callers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevisionConfig {
    pub files: IndexMap<String, FileEntry>,
    pub units: IndexMap<String, UnitEntry>,
    pub kernel_args: Vec<String>,
}

/// Per-resource reboot requirement, OR-folded across all contributing fragments.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RebootRequirements {
    pub files: IndexMap<String, bool>,
    pub units: IndexMap<String, bool>,
}

impl RebootRequirements {
    pub fn is_empty(&self) -> bool {
        self.files.is_empty() && self.units.is_empty()
    }
}

/// The reboot policy and legacy OR-folded hint carried on a revision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevisionRebootPolicy {
    pub strategy: RebootStrategy,
    pub required: bool,
    pub min_interval_seconds: u64,
}

/// The materialized target configuration for a pool at a point in time,
/// content-addressed by [`RenderedRevision::config_hash`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderedRevision {
    pub name: String,
    pub pool_name: String,
    pub revision: String,
    pub config_hash: String,
    pub config: RevisionConfig,
    pub reboot: RevisionRebootPolicy,
    pub reboot_requirements: RebootRequirements,
}

/// Builds a revision's deterministic base name (`rendered-<pool>-<revision>`),
/// with no collision suffix.
pub fn base_revision_name(pool_name: &str, revision: &str) -> String {
    format!("rendered-{pool_name}-{revision}")
}

/// Builds a revision's collision-suffixed name (`rendered-<pool>-<revision>-<n>`).
pub fn suffixed_revision_name(pool_name: &str, revision: &str, n: u32) -> String {
    format!("rendered-{pool_name}-{revision}-{n}")
}
