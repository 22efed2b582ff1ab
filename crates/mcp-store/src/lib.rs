//! The [`ObjectStore`] capability trait and an in-memory reference
//! implementation.
//!
//! The real object store — whatever system of record actually holds pools,
//! nodes, fragments, and revisions — is an external collaborator. This crate
//! only defines the shape the controller needs from it and a [`MemoryStore`]
//! good enough to drive the whole reconcile loop in tests and in standalone
//! runs.

mod error;
mod memory;
mod stored;
mod traits;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use stored::{Stored, StoreEvent};
pub use traits::ObjectStore;
