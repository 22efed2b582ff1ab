//! Core data model for the machine-config pool controller.
//!
//! This crate has no I/O: it defines the shapes that flow between the
//! renderer, the reboot classifier, the rollout planner, and the object
//! store — fragments, pools, nodes, and rendered revisions — plus the
//! shared label-selector and condition helpers they're all built on.

pub mod condition;
pub mod fragment;
pub mod node;
pub mod pool;
pub mod revision;
pub mod selector;

pub use condition::{find_condition, upsert_condition, Condition, ConditionStatus, ConditionType};
pub use fragment::{ConfigFragment, FileSpec, RebootHints, UnitDesiredState, UnitSpec};
pub use node::{AgentState, Node, NodeAnnotations};
pub use pool::{
    MaxUnavailable, MaxUnavailableParseError, Pool, PoolSpec, PoolStatus, RebootPolicy,
    RebootStrategy, DEFAULT_DEBOUNCE_SECONDS,
};
pub use revision::{
    base_revision_name, suffixed_revision_name, FileEntry, RebootRequirements, RenderedRevision,
    RevisionConfig, RevisionRebootPolicy, UnitEntry,
};
pub use selector::LabelSelector;
