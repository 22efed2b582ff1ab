//! Merges matching fragments into a canonical rendered revision and
//! reconciles it against the store (component C1).

mod error;
mod hash;
mod merge;
mod reconcile;

pub use error::{RenderError, Result};
pub use hash::{canonical_bytes, hash_config, CONFIG_HASH_HEX_LEN, REVISION_HEX_LEN};
pub use merge::merge_fragments;
pub use reconcile::{reconcile_revision, RenderOutcome};
