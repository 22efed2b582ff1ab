use mcp_types::{AgentState, Condition, ConditionStatus, ConditionType, Node};

use crate::lifecycle::Phase;

/// Per-node classification computed for status aggregation (§4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NodeStatus {
    pub updated: bool,
    pub degraded: bool,
    pub updating: bool,
    pub ready: bool,
}

/// Classifies a single node against `target_revision`, given its current
/// lifecycle [`Phase`] (the driver has already derived this for the same
/// reconcile pass — status aggregation never re-derives timeouts itself).
pub fn classify_node(node: &Node, target_revision: &str, phase: Phase) -> NodeStatus {
    let degraded = matches!(phase, Phase::TimedOut | Phase::DrainStuck)
        || node.annotations.agent_state() == Some(AgentState::Degraded);

    let updated = !degraded
        && !node.unschedulable
        && node.annotations.current_revision() == Some(target_revision)
        && node.annotations.agent_state() == Some(AgentState::Done);

    let updating = !degraded
        && (node.annotations.is_cordoned_by_controller()
            || node.annotations.desired_revision() != node.annotations.current_revision());

    let ready = updated && !degraded;

    NodeStatus {
        updated,
        degraded,
        updating,
        ready,
    }
}

/// Pool-wide machine counters, the fields of `PoolStatus` this component owns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AggregateCounters {
    pub machine_count: u32,
    pub updated_machine_count: u32,
    pub ready_machine_count: u32,
    pub updating_machine_count: u32,
    pub degraded_machine_count: u32,
}

/// Aggregates per-node classifications into pool-wide counters.
///
/// `nodes` and `phases` must be the same length and index-aligned — one
/// phase per node, computed by the caller for this same pass.
pub fn aggregate(nodes: &[Node], target_revision: &str, phases: &[Phase]) -> AggregateCounters {
    assert_eq!(nodes.len(), phases.len(), "nodes and phases must be index-aligned");

    let mut counters = AggregateCounters {
        machine_count: nodes.len() as u32,
        ..Default::default()
    };

    for (node, &phase) in nodes.iter().zip(phases) {
        let status = classify_node(node, target_revision, phase);
        if status.updated {
            counters.updated_machine_count += 1;
        }
        if status.ready {
            counters.ready_machine_count += 1;
        }
        if status.updating {
            counters.updating_machine_count += 1;
        }
        if status.degraded {
            counters.degraded_machine_count += 1;
        }
    }

    counters
}

/// Builds the pool's `Ready`/`Degraded`/`DrainStuck` conditions from
/// aggregated counters. `pool_overlap` and `any_drain_stuck` are supplied by
/// the overlap detector and the per-node phase list respectively.
pub fn pool_conditions(
    counters: &AggregateCounters,
    pool_overlap: bool,
    any_drain_stuck: bool,
) -> Vec<Condition> {
    let mut conditions = Vec::new();

    let degraded = counters.degraded_machine_count > 0 || pool_overlap;
    conditions.push(if degraded {
        Condition::new(
            ConditionType::Degraded,
            ConditionStatus::True,
            "DegradedMachinesPresent",
            format!(
                "{} degraded machine(s); poolOverlap={}",
                counters.degraded_machine_count, pool_overlap
            ),
        )
    } else {
        Condition::new(
            ConditionType::Degraded,
            ConditionStatus::False,
            "NoDegradedMachines",
            "no degraded machines",
        )
    });

    let ready = counters.updated_machine_count == counters.machine_count
        && counters.degraded_machine_count == 0
        && !pool_overlap;
    conditions.push(if ready {
        Condition::new(
            ConditionType::Ready,
            ConditionStatus::True,
            "AllMachinesUpdated",
            format!("{}/{} machines updated", counters.updated_machine_count, counters.machine_count),
        )
    } else {
        Condition::new(
            ConditionType::Ready,
            ConditionStatus::False,
            "MachinesNotUpdated",
            format!("{}/{} machines updated", counters.updated_machine_count, counters.machine_count),
        )
    });

    conditions.push(if counters.updating_machine_count > 0 {
        Condition::new(
            ConditionType::Updating,
            ConditionStatus::True,
            "RolloutInProgress",
            format!("{} machine(s) updating", counters.updating_machine_count),
        )
    } else {
        Condition::new(
            ConditionType::Updating,
            ConditionStatus::False,
            "NoMachinesUpdating",
            "no machines updating",
        )
    });

    if any_drain_stuck {
        conditions.push(Condition::new(
            ConditionType::DrainStuck,
            ConditionStatus::True,
            "DrainExceededTimeout",
            "at least one node's drain exceeded the configured timeout",
        ));
    }

    conditions
}
