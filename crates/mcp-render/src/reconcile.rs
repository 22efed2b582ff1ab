use mcp_store::{ObjectStore, Stored};
use mcp_types::{base_revision_name, suffixed_revision_name, Pool, RenderedRevision, RevisionRebootPolicy};
use tracing::{debug, info};

use crate::error::Result;
use crate::hash::{canonical_bytes, hash_config};
use crate::merge::merge_fragments;

/// The outcome of reconciling a pool's rendered revision for one pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderOutcome {
    /// The revision name the pool's `status.targetRevision` should point at.
    pub target_revision_name: String,
    /// True if this pass created a new revision object (fresh or collision-suffixed).
    pub created: bool,
}

fn legacy_required(reboot_requirements: &mcp_types::RebootRequirements) -> bool {
    reboot_requirements.files.values().any(|v| *v) || reboot_requirements.units.values().any(|v| *v)
}

/// Renders `pool`'s matching fragments and reconciles the resulting revision
/// object against the store, per §4.1: create on a fresh hash, patch the
/// reboot policy in place on a matching hash with a changed policy, or
/// create a collision-suffixed object on a name clash with a different hash.
///
/// `fragments` must already be filtered to those whose `label_selector`
/// matches `pool`; this function does not itself consult the store for
/// fragments so that callers can snapshot once per reconcile pass.
pub fn reconcile_revision(
    store: &dyn ObjectStore,
    pool: &Stored<Pool>,
    fragments: &[mcp_types::ConfigFragment],
) -> Result<RenderOutcome> {
    let (config, reboot_requirements) = merge_fragments(fragments);
    let policy = RevisionRebootPolicy {
        strategy: pool.value.spec.reboot.strategy,
        required: legacy_required(&reboot_requirements),
        min_interval_seconds: pool.value.spec.reboot.min_interval_seconds,
    };

    // `policy` never feeds the hash (see `canonical_bytes`): naming and
    // hash-collision detection depend only on rendered content, so a
    // policy-only change finds the existing revision below instead of
    // minting a new name.
    let bytes = canonical_bytes(&config, &reboot_requirements);
    let (config_hash, revision) = hash_config(&bytes);
    let base_name = base_revision_name(&pool.value.name, &revision);

    match store.get_revision(&base_name)? {
        None => {
            let candidate = RenderedRevision {
                name: base_name.clone(),
                pool_name: pool.value.name.clone(),
                revision,
                config_hash,
                config,
                reboot: policy,
                reboot_requirements,
            };
            let stored = store.create_revision(candidate)?;
            info!(revision = %stored.value.name, pool = %pool.value.name, "created rendered revision");
            Ok(RenderOutcome {
                target_revision_name: stored.value.name,
                created: true,
            })
        }
        Some(existing) if existing.value.config_hash == config_hash => {
            if existing.value.reboot != policy {
                let patched = store.patch_revision_reboot_policy(&base_name, policy)?;
                debug!(revision = %base_name, "refreshed reboot policy in place");
                Ok(RenderOutcome {
                    target_revision_name: patched.value.name,
                    created: false,
                })
            } else {
                Ok(RenderOutcome {
                    target_revision_name: existing.value.name,
                    created: false,
                })
            }
        }
        Some(_) => {
            let mut n: u32 = 1;
            loop {
                let candidate_name = suffixed_revision_name(&pool.value.name, &revision, n);
                if store.get_revision(&candidate_name)?.is_none() {
                    let candidate = RenderedRevision {
                        name: candidate_name.clone(),
                        pool_name: pool.value.name.clone(),
                        revision,
                        config_hash,
                        config,
                        reboot: policy,
                        reboot_requirements,
                    };
                    let stored = store.create_revision(candidate)?;
                    info!(
                        revision = %stored.value.name,
                        pool = %pool.value.name,
                        collision_n = n,
                        "configHash collision at deterministic name, created suffixed revision"
                    );
                    return Ok(RenderOutcome {
                        target_revision_name: stored.value.name,
                        created: true,
                    });
                }
                n += 1;
            }
        }
    }
}
