/// A value read from the store paired with the version it was read at.
///
/// The version is an opaque, per-object monotonic counter — analogous to a
/// `resourceVersion` — used to detect concurrent modification on write.
/// Callers read a `Stored<T>`, mutate `value`, then pass the whole envelope
/// back to `update_*`; the store rejects the write if another writer moved
/// the version in between.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stored<T> {
    pub value: T,
    pub version: u64,
}

impl<T> Stored<T> {
    pub fn new(value: T, version: u64) -> Self {
        Self { value, version }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Stored<U> {
        Stored {
            value: f(self.value),
            version: self.version,
        }
    }
}

/// A change notification for the controller's watch stream.
///
/// Carries only the kind and name of the changed object: watchers re-read
/// current state from the store rather than trust a possibly-stale payload,
/// the same level-triggered discipline the reconcile loop itself follows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
    PoolChanged(String),
    NodeChanged(String),
    FragmentChanged(String),
}
