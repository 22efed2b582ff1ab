use mcp_types::{Node, Pool};

use crate::budget::effective_max_unavailable;
use crate::overlap::{is_overlapped, OverlapMap};

/// True iff `node` counts against the pool's in-flight budget: cordoned by
/// the controller, or its `desired-revision` does not match its
/// `current-revision` (§4.4's `inFlight` set).
pub fn is_in_flight(node: &Node) -> bool {
    node.annotations.is_cordoned_by_controller()
        || node.annotations.desired_revision() != node.annotations.current_revision()
}

/// Base eligibility per §4.4, excluding the pool-level `paused`/overlap
/// checks (those are applied by the caller across the whole node set).
///
/// Note: §4.4's prose defines "not already updating" as `(not cordoned and
/// current-revision == targetRevision)`, but that reading is inconsistent
/// with scenario 1 in §8 (a node with no `current-revision` yet must still
/// be admitted on first apply). We follow the scenario: a node is eligible
/// when it is not cordoned and its `current-revision` does *not* already
/// match `targetRevision` — see `DESIGN.md` for this resolution.
pub fn is_eligible(node: &Node, target_revision: &str) -> bool {
    !node.annotations.is_cordoned_by_controller()
        && node.annotations.current_revision() != Some(target_revision)
}

/// The outcome of one pass of the rollout planner's budget + eligibility +
/// admission computation (component C4).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdmissionPlan {
    pub effective_max_unavailable: u32,
    pub in_flight: u32,
    pub slots: u32,
    /// Node names admitted this pass, ascending by name.
    pub admitted: Vec<String>,
}

/// Computes the admission batch for one reconcile pass.
///
/// `passes_reboot_gate` additionally excludes nodes that are blocked purely
/// by the supplemented `reboot.minIntervalSeconds` gate (see
/// [`crate::reboot_gate`]) — a node failing it is simply not admitted this
/// pass, exactly as if a budget slot weren't available for it.
pub fn plan_admission(
    pool: &Pool,
    nodes: &[Node],
    overlaps: &OverlapMap,
    target_revision: &str,
    passes_reboot_gate: &dyn Fn(&Node) -> bool,
) -> AdmissionPlan {
    let machine_count = nodes.len() as u32;
    let budget = effective_max_unavailable(pool.spec.max_unavailable, machine_count);

    if pool.spec.paused {
        return AdmissionPlan {
            effective_max_unavailable: budget,
            in_flight: 0,
            slots: 0,
            admitted: Vec::new(),
        };
    }

    let in_flight = nodes.iter().filter(|n| is_in_flight(n)).count() as u32;
    let slots = budget.saturating_sub(in_flight);

    let mut eligible: Vec<&Node> = nodes
        .iter()
        .filter(|n| !is_overlapped(&n.name, overlaps))
        .filter(|n| is_eligible(n, target_revision))
        .filter(|n| passes_reboot_gate(n))
        .collect();
    eligible.sort_by(|a, b| a.name.cmp(&b.name));

    let admitted = eligible
        .into_iter()
        .take(slots as usize)
        .map(|n| n.name.clone())
        .collect();

    AdmissionPlan {
        effective_max_unavailable: budget,
        in_flight,
        slots,
        admitted,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mcp_types::{LabelSelector, MaxUnavailable, NodeAnnotations, PoolSpec, PoolStatus, RebootPolicy, RebootStrategy};

    fn pool(max_unavailable: MaxUnavailable, paused: bool) -> Pool {
        Pool {
            name: "workers".to_string(),
            labels: Default::default(),
            spec: PoolSpec {
                node_selector: LabelSelector::default(),
                paused,
                max_unavailable,
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

    fn fresh_node(name: &str) -> Node {
        Node {
            name: name.to_string(),
            labels: Default::default(),
            annotations: NodeAnnotations::new(),
            unschedulable: false,
        }
    }

    #[test]
    fn fresh_nodes_with_no_current_revision_are_eligible() {
        let node = fresh_node("n1");
        assert!(is_eligible(&node, "rendered-workers-abc1234567"));
    }

    #[test]
    fn converged_node_is_not_eligible() {
        let node = fresh_node("n1");
        assert!(is_eligible(&node, "rendered-workers-abc1234567"));

        let mut converged = node;
        converged
            .annotations
            .simulate_agent_report("rendered-workers-abc1234567", mcp_types::AgentState::Done);
        assert!(!is_eligible(&converged, "rendered-workers-abc1234567"));
    }

    #[test]
    fn cordoned_node_is_not_eligible() {
        let mut node = fresh_node("n1");
        node.annotations.set_cordoned();
        assert!(!is_eligible(&node, "rendered-workers-abc1234567"));
    }

    #[test]
    fn admission_respects_budget_and_ascending_name_order() {
        let pool = pool(MaxUnavailable::Count(1), false);
        let nodes = vec![fresh_node("b"), fresh_node("a"), fresh_node("c")];
        let plan = plan_admission(&pool, &nodes, &OverlapMap::new(), "rendered-workers-abc1234567", &|_| true);
        assert_eq!(plan.admitted, vec!["a".to_string()]);
    }

    #[test]
    fn paused_pool_admits_nothing() {
        let pool = pool(MaxUnavailable::Count(5), true);
        let nodes = vec![fresh_node("a")];
        let plan = plan_admission(&pool, &nodes, &OverlapMap::new(), "rendered-workers-abc1234567", &|_| true);
        assert!(plan.admitted.is_empty());
    }

    #[test]
    fn in_flight_nodes_consume_budget_slots() {
        let pool = pool(MaxUnavailable::Count(1), false);
        let mut cordoned = fresh_node("a");
        cordoned.annotations.set_cordoned();
        let nodes = vec![cordoned, fresh_node("b")];
        let plan = plan_admission(&pool, &nodes, &OverlapMap::new(), "rendered-workers-abc1234567", &|_| true);
        assert_eq!(plan.in_flight, 1);
        assert_eq!(plan.slots, 0);
        assert!(plan.admitted.is_empty());
    }
}
