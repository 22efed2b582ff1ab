use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::selector::LabelSelector;

/// A single file to be written on a node, as authored in a fragment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSpec {
    pub path: String,
    pub content: String,
    pub mode: u32,
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default)]
    pub group: Option<String>,
}

/// The desired state of a systemd-style unit managed by the on-node agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnitDesiredState {
    Enabled,
    Disabled,
    Masked,
}

/// A single unit to be reconciled on a node, as authored in a fragment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitSpec {
    pub name: String,
    pub content: String,
    pub desired_state: UnitDesiredState,
}

/// Per-resource declarations of whether a change to that resource across
/// revisions requires a reboot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RebootHints {
    #[serde(default)]
    pub files: IndexMap<String, bool>,
    #[serde(default)]
    pub units: IndexMap<String, bool>,
}

/// An authored configuration fragment, selected into pools by label.
///
/// Fragments are immutable for the duration of a single reconcile pass: the
/// renderer snapshots the full set of matching fragments before merging.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigFragment {
    pub name: String,
    pub label_selector: LabelSelector,
    pub priority: i64,
    #[serde(default)]
    pub files: Vec<FileSpec>,
    #[serde(default)]
    pub units: Vec<UnitSpec>,
    #[serde(default)]
    pub kernel_args: Vec<String>,
    #[serde(default)]
    pub reboot_hints: RebootHints,
}
