//! Per-node reboot decision: given a previous and a new rendered revision,
//! decide whether a reboot is required and why (component C2).

mod decide;
mod fetcher;

pub use decide::{decide, Decision, DecisionMethod};
pub use fetcher::{FetchError, RevisionFetcher};
