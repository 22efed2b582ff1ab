use chrono::{DateTime, Duration, Utc};
use indexmap::IndexMap;
use mcp_reboot::{decide, FetchError, RevisionFetcher};
use mcp_store::{ObjectStore, Stored, StoreError};
use mcp_types::{Condition, Node, Pool};
use tracing::info;

use crate::budget::effective_max_unavailable;
use crate::drain::PodSource;
use crate::eligibility::{plan_admission, AdmissionPlan};
use crate::lifecycle::{advance, classify_phase, AdvanceContext, Phase};
use crate::overlap::{detect_overlaps, overlap_condition};
use crate::reboot_gate::{effective_reboot_required, min_interval_elapsed};
use crate::status::{aggregate, pool_conditions};

use crate::error::Result;

/// Timing/tunable inputs to one reconcile pass, threaded through rather than
/// read from a clock so passes stay deterministic and testable.
pub struct ReconcileContext<'a> {
    pub now: DateTime<Utc>,
    pub drain_timeout: Duration,
    pub eviction_grace: Duration,
    pub pods: &'a dyn PodSource,
}

/// What one call to [`reconcile_pool`] observed and did.
#[derive(Debug, Clone)]
pub struct PoolReconcileReport {
    pub target_revision_name: String,
    pub revision_created: bool,
    pub admitted: Vec<String>,
    pub conditions: Vec<Condition>,
}

struct StoreFetcher<'a> {
    store: &'a dyn ObjectStore,
}

impl RevisionFetcher for StoreFetcher<'_> {
    fn fetch(&self, name: &str) -> std::result::Result<mcp_types::RenderedRevision, FetchError> {
        self.store
            .get_revision(name)
            .map_err(|e| FetchError(e.to_string()))?
            .map(|stored| stored.value)
            .ok_or_else(|| FetchError(format!("revision {name:?} not found")))
    }
}

const MAX_WRITE_RETRIES: u32 = 3;

/// Persists an advanced node, retrying on optimistic-concurrency conflict
/// (§5: "concurrent node writes use optimistic retry on version-conflict").
///
/// A conflict here means something else — typically the agent reporting
/// `current-revision`/`agent-state` — wrote the node between our read and
/// our write. Rather than clobber that write with our stale copy, each
/// retry re-reads the node and re-runs `advance` against its latest state,
/// so the agent's fields survive and only the controller-owned annotations
/// this pass decided on are reapplied.
fn update_node_with_retry(
    store: &dyn ObjectStore,
    mut node: Stored<Node>,
    admit_now: bool,
    reboot_required_this_assignment: bool,
    advance_ctx: &AdvanceContext<'_>,
) -> Result<Stored<Node>> {
    let name = node.value.name.clone();
    for attempt in 0..MAX_WRITE_RETRIES {
        match store.update_node(node) {
            Ok(persisted) => return Ok(persisted),
            Err(StoreError::Conflict { .. }) if attempt + 1 < MAX_WRITE_RETRIES => {
                let mut fresh = store.get_node(&name)?.ok_or(StoreError::NotFound {
                    kind: "node",
                    name: name.clone(),
                })?;
                advance(&mut fresh.value, admit_now, reboot_required_this_assignment, advance_ctx);
                node = fresh;
            }
            Err(other) => return Err(other.into()),
        }
    }
    unreachable!("loop always returns or propagates by the final attempt")
}

/// Gathers the nodes matched by at least one pool's selector, for overlap
/// detection (§4.3) — nodes matched by zero pools never overlap and are
/// irrelevant here.
fn nodes_matched_by_any_pool(
    store: &dyn ObjectStore,
    pools: &[Stored<Pool>],
) -> Result<IndexMap<String, Stored<Node>>> {
    let mut by_name = IndexMap::new();
    for pool in pools {
        for node in store.list_nodes_by_label(&pool.value.spec.node_selector)? {
            by_name.entry(node.value.name.clone()).or_insert(node);
        }
    }
    Ok(by_name)
}

/// Runs one reconcile pass for a single pool: renders/reconciles its target
/// revision (C1), detects cross-pool overlap (C3), plans an admission batch
/// (C4), advances every matched node one lifecycle step (C5), and aggregates
/// pool status (C6). Mirrors the write order in §5: revision, then node
/// annotations, then pool status.
pub fn reconcile_pool(
    store: &dyn ObjectStore,
    pool_name: &str,
    ctx: &ReconcileContext<'_>,
) -> Result<PoolReconcileReport> {
    let all_pools = store.list_pools()?;
    let mut pool = store.get_pool(pool_name)?.ok_or(StoreError::NotFound {
        kind: "pool",
        name: pool_name.to_string(),
    })?;

    let all_nodes_by_name = nodes_matched_by_any_pool(store, &all_pools)?;
    let all_pool_values: Vec<Pool> = all_pools.iter().map(|p| p.value.clone()).collect();
    let all_node_values: Vec<Node> = all_nodes_by_name.values().map(|n| n.value.clone()).collect();
    let overlaps = detect_overlaps(&all_pool_values, &all_node_values);
    let pool_is_overlapped = overlap_condition(pool_name, &overlaps).is_some();

    let fragments: Vec<_> = store
        .list_fragments()?
        .into_iter()
        .map(|f| f.value)
        .filter(|f| f.label_selector.matches(&pool.value.labels))
        .collect();
    let render_outcome = mcp_render::reconcile_revision(store, &pool, &fragments)?;
    info!(
        pool = %pool_name,
        revision = %render_outcome.target_revision_name,
        created = render_outcome.created,
        "rendered revision reconciled"
    );

    let target_revision = store
        .get_revision(&render_outcome.target_revision_name)?
        .expect("just-reconciled revision must exist")
        .value;

    let my_nodes = store.list_nodes_by_label(&pool.value.spec.node_selector)?;
    let fetcher = StoreFetcher { store };

    let admission = if pool_is_overlapped {
        AdmissionPlan {
            effective_max_unavailable: effective_max_unavailable(
                pool.value.spec.max_unavailable,
                my_nodes.len() as u32,
            ),
            in_flight: 0,
            slots: 0,
            admitted: Vec::new(),
        }
    } else {
        let node_values: Vec<Node> = my_nodes.iter().map(|n| n.value.clone()).collect();
        plan_admission(
            &pool.value,
            &node_values,
            &overlaps,
            &render_outcome.target_revision_name,
            &|node: &Node| {
                let previous = node.annotations.desired_revision().unwrap_or("");
                let verdict = decide(previous, &target_revision, &fetcher).required;
                let required = effective_reboot_required(verdict, pool.value.spec.reboot.strategy, true);
                if !required {
                    return true;
                }
                min_interval_elapsed(
                    node.annotations.last_reboot_required_at(),
                    pool.value.spec.reboot.min_interval_seconds,
                    ctx.now,
                )
            },
        )
    };

    let mut phases = Vec::with_capacity(my_nodes.len());
    let mut updated_nodes = Vec::with_capacity(my_nodes.len());
    let mut any_drain_stuck = false;

    if pool_is_overlapped {
        // Overlap suspends all per-node advancement for this pool, not just
        // new admissions: scenario 5 requires an overlapped node to carry no
        // `desired-revision` at all while the conflict stands.
        for stored_node in &my_nodes {
            phases.push(classify_phase(
                &stored_node.value,
                ctx.now,
                ctx.drain_timeout,
                pool.value.spec.apply_timeout_seconds,
            ));
            updated_nodes.push(stored_node.value.clone());
        }
    } else {
        for stored_node in my_nodes {
            let Stored { mut value, version } = stored_node;
            let admit_now = admission.admitted.iter().any(|n| n == &value.name);

            let reboot_required_this_assignment = if admit_now {
                let previous = value.annotations.desired_revision().unwrap_or("");
                let verdict = decide(previous, &target_revision, &fetcher).required;
                effective_reboot_required(verdict, pool.value.spec.reboot.strategy, true)
            } else {
                false
            };

            let pods_here = ctx.pods.pods_on_node(&value.name);
            let advance_ctx = AdvanceContext {
                target_revision: &render_outcome.target_revision_name,
                now: ctx.now,
                apply_timeout_seconds: pool.value.spec.apply_timeout_seconds,
                drain_timeout: ctx.drain_timeout,
                pods: &pods_here,
                eviction_grace: ctx.eviction_grace,
            };
            advance(&mut value, admit_now, reboot_required_this_assignment, &advance_ctx);

            let persisted = update_node_with_retry(
                store,
                Stored::new(value, version),
                admit_now,
                reboot_required_this_assignment,
                &advance_ctx,
            )?;
            let phase = classify_phase(
                &persisted.value,
                ctx.now,
                ctx.drain_timeout,
                pool.value.spec.apply_timeout_seconds,
            );
            if phase == Phase::DrainStuck {
                any_drain_stuck = true;
            }
            phases.push(phase);
            updated_nodes.push(persisted.value);
        }
    }

    let counters = aggregate(&updated_nodes, &render_outcome.target_revision_name, &phases);
    let mut conditions = pool_conditions(&counters, pool_is_overlapped, any_drain_stuck);
    if let Some(overlap) = overlap_condition(pool_name, &overlaps) {
        conditions.push(overlap);
    }

    pool.value.status.target_revision = Some(render_outcome.target_revision_name.clone());
    pool.value.status.machine_count = counters.machine_count;
    pool.value.status.updated_machine_count = counters.updated_machine_count;
    pool.value.status.ready_machine_count = counters.ready_machine_count;
    pool.value.status.updating_machine_count = counters.updating_machine_count;
    pool.value.status.degraded_machine_count = counters.degraded_machine_count;
    pool.value.status.conditions = conditions.clone();
    store.update_pool(pool)?;

    Ok(PoolReconcileReport {
        target_revision_name: render_outcome.target_revision_name,
        revision_created: render_outcome.created,
        admitted: admission.admitted,
        conditions,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::indexmap;
    use mcp_store::MemoryStore;
    use mcp_types::{
        AgentState, FileSpec, LabelSelector, MaxUnavailable, NodeAnnotations, PoolSpec, PoolStatus,
        RebootPolicy, RebootStrategy,
    };

    use crate::drain::Pod;

    struct NoPods;
    impl PodSource for NoPods {
        fn pods_on_node(&self, _node_name: &str) -> Vec<Pod> {
            Vec::new()
        }
    }

    fn ctx(now: DateTime<Utc>) -> ReconcileContext<'static> {
        ReconcileContext {
            now,
            drain_timeout: Duration::minutes(10),
            eviction_grace: Duration::seconds(30),
            pods: &NoPods,
        }
    }

    fn pool(name: &str) -> Pool {
        Pool {
            name: name.to_string(),
            labels: IndexMap::new(),
            spec: PoolSpec {
                node_selector: LabelSelector::new(indexmap! { "pool".to_string() => name.to_string() }),
                paused: false,
                max_unavailable: MaxUnavailable::Count(1),
                apply_timeout_seconds: 0,
                reboot: RebootPolicy {
                    strategy: RebootStrategy::IfRequired,
                    min_interval_seconds: 0,
                },
                debounce_seconds: 30,
            },
            status: PoolStatus::default(),
        }
    }

    fn node(name: &str, pool_name: &str) -> Node {
        Node {
            name: name.to_string(),
            labels: indexmap! { "pool".to_string() => pool_name.to_string() },
            annotations: NodeAnnotations::new(),
            unschedulable: false,
        }
    }

    #[test]
    fn first_apply_creates_revision_and_cordons_single_node() {
        let store = MemoryStore::new();
        store.seed_pool(pool("workers"));
        store.seed_node(node("n1", "workers"));
        store.seed_fragment(mcp_types::ConfigFragment {
            name: "f1".to_string(),
            label_selector: LabelSelector::default(),
            priority: 0,
            files: vec![FileSpec {
                path: "/etc/test.conf".to_string(),
                content: "key=value".to_string(),
                mode: 0o644,
                owner: None,
                group: None,
            }],
            units: Vec::new(),
            kernel_args: Vec::new(),
            reboot_hints: Default::default(),
        });

        let report = reconcile_pool(&store, "workers", &ctx(Utc::now())).unwrap();
        assert!(report.revision_created);
        assert_eq!(report.admitted, vec!["n1".to_string()]);

        let n1 = store.get_node("n1").unwrap().unwrap();
        assert!(n1.value.annotations.is_cordoned_by_controller());

        let updated_pool = store.get_pool("workers").unwrap().unwrap();
        assert_eq!(updated_pool.value.status.machine_count, 1);
    }

    #[test]
    fn paused_pool_creates_revision_but_admits_no_nodes() {
        let store = MemoryStore::new();
        let mut p = pool("workers");
        p.spec.paused = true;
        store.seed_pool(p);
        store.seed_node(node("n1", "workers"));

        let report = reconcile_pool(&store, "workers", &ctx(Utc::now())).unwrap();
        assert!(report.admitted.is_empty());

        let n1 = store.get_node("n1").unwrap().unwrap();
        assert!(n1.value.annotations.desired_revision().is_none());
    }

    #[test]
    fn overlapping_pools_are_degraded_and_admit_nothing() {
        let store = MemoryStore::new();
        let mut p1 = pool("workers");
        p1.spec.node_selector = LabelSelector::new(indexmap! { "env".to_string() => "prod".to_string() });
        let mut p2 = pool("canaries");
        p2.spec.node_selector = LabelSelector::new(indexmap! { "env".to_string() => "prod".to_string() });
        store.seed_pool(p1);
        store.seed_pool(p2);
        store.seed_node(Node {
            name: "n1".to_string(),
            labels: indexmap! { "env".to_string() => "prod".to_string() },
            annotations: NodeAnnotations::new(),
            unschedulable: false,
        });

        let report = reconcile_pool(&store, "workers", &ctx(Utc::now())).unwrap();
        assert!(report.admitted.is_empty());
        assert!(report
            .conditions
            .iter()
            .any(|c| c.type_ == mcp_types::ConditionType::PoolOverlap && c.is_true()));
        assert!(report
            .conditions
            .iter()
            .any(|c| c.type_ == mcp_types::ConditionType::Degraded && c.is_true()));

        let n1 = store.get_node("n1").unwrap().unwrap();
        assert!(n1.value.annotations.desired_revision().is_none());
    }

    #[test]
    fn full_pass_to_convergence_reports_ready() {
        let store = MemoryStore::new();
        store.seed_pool(pool("workers"));
        store.seed_node(node("n1", "workers"));

        let now = Utc::now();
        reconcile_pool(&store, "workers", &ctx(now)).unwrap(); // Idle -> Cordoning
        reconcile_pool(&store, "workers", &ctx(now)).unwrap(); // Cordoning -> Draining
        reconcile_pool(&store, "workers", &ctx(now)).unwrap(); // Draining -> Assigning

        let mut n1 = store.get_node("n1").unwrap().unwrap();
        let target = n1.value.annotations.desired_revision().unwrap().to_string();
        n1.value.annotations.simulate_agent_report(&target, AgentState::Done);
        store.update_node(n1).unwrap();

        let report = reconcile_pool(&store, "workers", &ctx(now)).unwrap(); // AwaitingApply -> Uncordoning
        assert!(report
            .conditions
            .iter()
            .any(|c| c.type_ == mcp_types::ConditionType::Ready && c.is_true()));

        let n1 = store.get_node("n1").unwrap().unwrap();
        assert!(!n1.value.unschedulable);
        assert!(!n1.value.annotations.is_cordoned_by_controller());
    }
}
