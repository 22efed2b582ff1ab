use mcp_types::{ConfigFragment, LabelSelector, Node, Pool, RenderedRevision, RevisionRebootPolicy};
use tokio::sync::broadcast;

use crate::error::Result;
use crate::stored::{Stored, StoreEvent};

/// Capability trait for the external object store the controller reconciles
/// against.
///
/// This is deliberately synchronous and object-safe, following the same
/// absence-is-not-an-error discipline as a content-addressed blob store:
/// `get_*` returns `Ok(None)` for a missing object, never an error. Writers
/// pass back the [`Stored`] envelope they read to get optimistic-concurrency
/// protection; a write against a stale version returns
/// [`crate::error::StoreError::Conflict`].
///
/// Fragments are authored externally and read-only from the controller's
/// point of view, so there is no `update_fragment`. Pools and nodes are
/// provisioned externally too — the controller only ever mutates their
/// status/annotations, never creates or deletes them. Rendered revisions are
/// the one kind the controller creates.
pub trait ObjectStore: Send + Sync {
    fn list_fragments(&self) -> Result<Vec<Stored<ConfigFragment>>>;

    fn get_pool(&self, name: &str) -> Result<Option<Stored<Pool>>>;
    fn list_pools(&self) -> Result<Vec<Stored<Pool>>>;
    fn update_pool(&self, pool: Stored<Pool>) -> Result<Stored<Pool>>;

    fn get_node(&self, name: &str) -> Result<Option<Stored<Node>>>;
    fn list_nodes_by_label(&self, selector: &LabelSelector) -> Result<Vec<Stored<Node>>>;
    fn update_node(&self, node: Stored<Node>) -> Result<Stored<Node>>;

    fn get_revision(&self, name: &str) -> Result<Option<Stored<RenderedRevision>>>;
    fn list_revisions_for_pool(&self, pool_name: &str) -> Result<Vec<Stored<RenderedRevision>>>;
    fn create_revision(&self, revision: RenderedRevision) -> Result<Stored<RenderedRevision>>;

    /// Patches only the `reboot` policy field of an existing revision,
    /// in place, without touching `configHash` — the one permitted in-place
    /// mutation once a revision exists.
    fn patch_revision_reboot_policy(
        &self,
        name: &str,
        policy: RevisionRebootPolicy,
    ) -> Result<Stored<RenderedRevision>>;

    /// Subscribes to change notifications. Each call gets its own receiver;
    /// slow subscribers lag rather than block writers (see
    /// [`tokio::sync::broadcast`]).
    fn watch(&self) -> broadcast::Receiver<StoreEvent>;
}
