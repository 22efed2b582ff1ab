use mcp_store::{ObjectStore, StoreError};
use mcp_types::DEFAULT_DEBOUNCE_SECONDS;

/// Resolves a raw store change notification to the pool names whose
/// reconcile it should enqueue, per §4.7: a pool change enqueues just that
/// pool; a fragment change enqueues every pool whose labels the fragment's
/// selector matches; a node change enqueues every pool whose `nodeSelector`
/// matches that node.
pub fn resolve_affected_pools(
    store: &dyn ObjectStore,
    event: &mcp_store::StoreEvent,
) -> Result<Vec<String>, StoreError> {
    use mcp_store::StoreEvent::*;

    match event {
        PoolChanged(name) => Ok(vec![name.clone()]),
        FragmentChanged(name) => {
            let Some(fragment) = store
                .list_fragments()?
                .into_iter()
                .find(|f| f.value.name == *name)
            else {
                return Ok(Vec::new());
            };
            Ok(store
                .list_pools()?
                .into_iter()
                .filter(|p| fragment.value.label_selector.matches(&p.value.labels))
                .map(|p| p.value.name)
                .collect())
        }
        NodeChanged(name) => {
            let Some(node) = store.get_node(name)? else {
                return Ok(Vec::new());
            };
            Ok(store
                .list_pools()?
                .into_iter()
                .filter(|p| p.value.spec.node_selector.matches(&node.value.labels))
                .map(|p| p.value.name)
                .collect())
        }
    }
}

/// Whether `event` carries the "higher-priority" signal that bypasses a
/// pool's debounce window (§4.7): a node change may be the node reporting a
/// degraded apply, so it always jumps the queue; routine pool/fragment edits
/// wait out the debounce like everything else.
pub fn is_priority_event(event: &mcp_store::StoreEvent) -> bool {
    matches!(event, mcp_store::StoreEvent::NodeChanged(_))
}

pub fn default_debounce_seconds() -> u64 {
    DEFAULT_DEBOUNCE_SECONDS
}
