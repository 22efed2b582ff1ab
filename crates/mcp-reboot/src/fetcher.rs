use mcp_types::RenderedRevision;
use thiserror::Error;

/// An opaque fetch failure — the decider only needs to know fetching failed,
/// not why; on any failure it degrades to [`crate::DecisionMethod::LegacyFallback`].
#[derive(Debug, Error)]
#[error("failed to fetch revision: {0}")]
pub struct FetchError(pub String);

/// Capability the reboot decider needs to look up a previous revision by
/// name, kept separate from [`mcp_store::ObjectStore`] so the decider can be
/// tested without a live store.
pub trait RevisionFetcher {
    fn fetch(&self, name: &str) -> Result<RenderedRevision, FetchError>;
}
