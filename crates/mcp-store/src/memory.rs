use std::sync::Mutex;

use indexmap::IndexMap;
use mcp_types::{ConfigFragment, LabelSelector, Node, Pool, RenderedRevision, RevisionRebootPolicy};
use tokio::sync::broadcast;

use crate::error::{Result, StoreError};
use crate::stored::{Stored, StoreEvent};
use crate::traits::ObjectStore;

const EVENT_CHANNEL_CAPACITY: usize = 256;

struct Slot<T> {
    value: T,
    version: u64,
}

/// An in-memory [`ObjectStore`] reference implementation, for tests and for
/// running the controller standalone without a real backing service.
///
/// All state lives behind a single [`Mutex`]; this trades throughput for the
/// simplicity of a trivially-correct reference — real deployments implement
/// [`ObjectStore`] against whatever fleet-management service actually holds
/// this state.
pub struct MemoryStore {
    fragments: Mutex<IndexMap<String, ConfigFragment>>,
    pools: Mutex<IndexMap<String, Slot<Pool>>>,
    nodes: Mutex<IndexMap<String, Slot<Node>>>,
    revisions: Mutex<IndexMap<String, Slot<RenderedRevision>>>,
    events: broadcast::Sender<StoreEvent>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            fragments: Mutex::new(IndexMap::new()),
            pools: Mutex::new(IndexMap::new()),
            nodes: Mutex::new(IndexMap::new()),
            revisions: Mutex::new(IndexMap::new()),
            events,
        }
    }

    /// Seeds a pool's initial state, bypassing optimistic-concurrency checks.
    /// For test and bootstrap setup only.
    pub fn seed_pool(&self, pool: Pool) {
        let name = pool.name.clone();
        self.pools
            .lock()
            .unwrap()
            .insert(name, Slot { value: pool, version: 0 });
    }

    pub fn seed_node(&self, node: Node) {
        let name = node.name.clone();
        self.nodes
            .lock()
            .unwrap()
            .insert(name, Slot { value: node, version: 0 });
    }

    pub fn seed_fragment(&self, fragment: ConfigFragment) {
        let name = fragment.name.clone();
        self.fragments.lock().unwrap().insert(name, fragment);
    }

    /// Replaces the full fragment set and notifies watchers, simulating an
    /// external author editing fragments out of band.
    pub fn replace_fragments(&self, fragments: Vec<ConfigFragment>) {
        let mut guard = self.fragments.lock().unwrap();
        guard.clear();
        for fragment in fragments {
            let name = fragment.name.clone();
            let _ = self.events.send(StoreEvent::FragmentChanged(name.clone()));
            guard.insert(name, fragment);
        }
    }
}

impl ObjectStore for MemoryStore {
    fn list_fragments(&self) -> Result<Vec<Stored<ConfigFragment>>> {
        Ok(self
            .fragments
            .lock()
            .unwrap()
            .values()
            .cloned()
            .map(|f| Stored::new(f, 0))
            .collect())
    }

    fn get_pool(&self, name: &str) -> Result<Option<Stored<Pool>>> {
        Ok(self
            .pools
            .lock()
            .unwrap()
            .get(name)
            .map(|slot| Stored::new(slot.value.clone(), slot.version)))
    }

    fn list_pools(&self) -> Result<Vec<Stored<Pool>>> {
        Ok(self
            .pools
            .lock()
            .unwrap()
            .values()
            .map(|slot| Stored::new(slot.value.clone(), slot.version))
            .collect())
    }

    fn update_pool(&self, pool: Stored<Pool>) -> Result<Stored<Pool>> {
        let mut guard = self.pools.lock().unwrap();
        let name = pool.value.name.clone();
        let current_version = guard
            .get(&name)
            .ok_or_else(|| StoreError::NotFound {
                kind: "pool",
                name: name.clone(),
            })?
            .version;
        if current_version != pool.version {
            return Err(StoreError::Conflict {
                kind: "pool",
                name,
                expected: pool.version,
                actual: current_version,
            });
        }
        let next_version = current_version + 1;
        guard.insert(
            name.clone(),
            Slot {
                value: pool.value.clone(),
                version: next_version,
            },
        );
        drop(guard);
        let _ = self.events.send(StoreEvent::PoolChanged(name));
        Ok(Stored::new(pool.value, next_version))
    }

    fn get_node(&self, name: &str) -> Result<Option<Stored<Node>>> {
        Ok(self
            .nodes
            .lock()
            .unwrap()
            .get(name)
            .map(|slot| Stored::new(slot.value.clone(), slot.version)))
    }

    fn list_nodes_by_label(&self, selector: &LabelSelector) -> Result<Vec<Stored<Node>>> {
        Ok(self
            .nodes
            .lock()
            .unwrap()
            .values()
            .filter(|slot| selector.matches(&slot.value.labels))
            .map(|slot| Stored::new(slot.value.clone(), slot.version))
            .collect())
    }

    fn update_node(&self, node: Stored<Node>) -> Result<Stored<Node>> {
        let mut guard = self.nodes.lock().unwrap();
        let name = node.value.name.clone();
        let current_version = guard
            .get(&name)
            .ok_or_else(|| StoreError::NotFound {
                kind: "node",
                name: name.clone(),
            })?
            .version;
        if current_version != node.version {
            return Err(StoreError::Conflict {
                kind: "node",
                name,
                expected: node.version,
                actual: current_version,
            });
        }
        let next_version = current_version + 1;
        guard.insert(
            name.clone(),
            Slot {
                value: node.value.clone(),
                version: next_version,
            },
        );
        drop(guard);
        let _ = self.events.send(StoreEvent::NodeChanged(name));
        Ok(Stored::new(node.value, next_version))
    }

    fn get_revision(&self, name: &str) -> Result<Option<Stored<RenderedRevision>>> {
        Ok(self
            .revisions
            .lock()
            .unwrap()
            .get(name)
            .map(|slot| Stored::new(slot.value.clone(), slot.version)))
    }

    fn list_revisions_for_pool(&self, pool_name: &str) -> Result<Vec<Stored<RenderedRevision>>> {
        Ok(self
            .revisions
            .lock()
            .unwrap()
            .values()
            .filter(|slot| slot.value.pool_name == pool_name)
            .map(|slot| Stored::new(slot.value.clone(), slot.version))
            .collect())
    }

    fn create_revision(&self, revision: RenderedRevision) -> Result<Stored<RenderedRevision>> {
        let mut guard = self.revisions.lock().unwrap();
        let name = revision.name.clone();
        if guard.contains_key(&name) {
            return Ok(Stored::new(guard[&name].value.clone(), guard[&name].version));
        }
        guard.insert(name, Slot { value: revision.clone(), version: 0 });
        Ok(Stored::new(revision, 0))
    }

    fn patch_revision_reboot_policy(
        &self,
        name: &str,
        policy: RevisionRebootPolicy,
    ) -> Result<Stored<RenderedRevision>> {
        let mut guard = self.revisions.lock().unwrap();
        let slot = guard.get_mut(name).ok_or_else(|| StoreError::NotFound {
            kind: "revision",
            name: name.to_string(),
        })?;
        slot.value.reboot = policy;
        slot.version += 1;
        Ok(Stored::new(slot.value.clone(), slot.version))
    }

    fn watch(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }
}
