use chrono::{DateTime, Duration, Utc};
use mcp_types::{AgentState, Node};
use tracing::{debug, warn};

use crate::drain::{plan_drain, Pod};

/// A node's position in the per-node rollout state machine (§4.5).
///
/// `Assigning` and `Uncordoning` are instantaneous actions rather than
/// states a fresh read of node state can ever observe — [`classify_phase`]
/// never returns them; they only appear in an [`AdvanceOutcome`] to record
/// which action a call to [`advance`] just took.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Cordoning,
    Draining,
    Assigning,
    AwaitingApply,
    Uncordoning,
    TimedOut,
    DrainStuck,
}

/// Derives a node's current phase purely from its annotations and
/// `unschedulable` bit — no hidden state.
pub fn classify_phase(
    node: &Node,
    now: DateTime<Utc>,
    drain_timeout: Duration,
    apply_timeout_seconds: u64,
) -> Phase {
    if !node.annotations.is_cordoned_by_controller() {
        return Phase::Idle;
    }

    let Some(drain_started_at) = node.annotations.drain_started_at() else {
        return Phase::Cordoning;
    };

    if node.annotations.desired_revision().is_none() {
        return if now.signed_duration_since(drain_started_at) > drain_timeout {
            Phase::DrainStuck
        } else {
            Phase::Draining
        };
    }

    let converged = node.annotations.current_revision() == node.annotations.desired_revision()
        && node.annotations.agent_state() == Some(AgentState::Done);
    if converged {
        return Phase::AwaitingApply;
    }

    if apply_timeout_seconds > 0 {
        let set_at = node
            .annotations
            .desired_revision_set_at()
            .unwrap_or(now);
        if now.signed_duration_since(set_at) > Duration::seconds(apply_timeout_seconds as i64) {
            return Phase::TimedOut;
        }
    }

    Phase::AwaitingApply
}

/// Inputs for one call to [`advance`] beyond the node itself.
pub struct AdvanceContext<'a> {
    pub target_revision: &'a str,
    pub now: DateTime<Utc>,
    pub apply_timeout_seconds: u64,
    pub drain_timeout: Duration,
    pub pods: &'a [Pod],
    pub eviction_grace: Duration,
}

/// What `advance` did this pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdvanceOutcome {
    pub phase: Phase,
    pub pods_to_evict: Vec<String>,
}

/// Advances `node` exactly one step through the lifecycle state machine,
/// mutating its annotations/`unschedulable` bit in place.
///
/// `admit_now` requests the Idle → Cordoning transition (the planner
/// decided to admit this node this pass); it's ignored for nodes already
/// past Idle. `reboot_required_this_assignment` is the gated reboot verdict
/// for the revision this node is about to receive — recorded as
/// `last-reboot-required-at` at the moment of cordoning, per the
/// `reboot.minIntervalSeconds` supplement.
pub fn advance(
    node: &mut Node,
    admit_now: bool,
    reboot_required_this_assignment: bool,
    ctx: &AdvanceContext<'_>,
) -> AdvanceOutcome {
    let phase = classify_phase(node, ctx.now, ctx.drain_timeout, ctx.apply_timeout_seconds);

    match phase {
        Phase::Idle => {
            if !admit_now {
                return AdvanceOutcome {
                    phase: Phase::Idle,
                    pods_to_evict: Vec::new(),
                };
            }
            node.unschedulable = true;
            node.annotations.set_cordoned();
            if reboot_required_this_assignment {
                node.annotations.set_last_reboot_required_at(ctx.now);
            }
            debug!(node = %node.name, "admitted: cordoning");
            AdvanceOutcome {
                phase: Phase::Cordoning,
                pods_to_evict: Vec::new(),
            }
        }

        Phase::Cordoning => {
            node.annotations.set_drain_started_at(ctx.now);
            debug!(node = %node.name, "unschedulable observed, draining");
            AdvanceOutcome {
                phase: Phase::Draining,
                pods_to_evict: Vec::new(),
            }
        }

        Phase::Draining => {
            let drain = plan_drain(ctx.pods, ctx.now, ctx.eviction_grace);
            if drain.complete {
                node.annotations
                    .set_desired_revision(ctx.target_revision, ctx.now);
                debug!(node = %node.name, revision = ctx.target_revision, "drain complete, assigning revision");
                AdvanceOutcome {
                    phase: Phase::Assigning,
                    pods_to_evict: Vec::new(),
                }
            } else {
                let retries = node.annotations.drain_retry_count();
                node.annotations.set_drain_retry_count(retries + 1);
                AdvanceOutcome {
                    phase: Phase::Draining,
                    pods_to_evict: drain.to_request,
                }
            }
        }

        Phase::DrainStuck => {
            warn!(node = %node.name, "drain stuck past timeout");
            AdvanceOutcome {
                phase: Phase::DrainStuck,
                pods_to_evict: Vec::new(),
            }
        }

        Phase::AwaitingApply => {
            if !node.unschedulable {
                // Agent still applying: re-cordon even if externally cleared.
                node.unschedulable = true;
            }
            let converged = node.annotations.current_revision() == node.annotations.desired_revision()
                && node.annotations.agent_state() == Some(AgentState::Done);
            if converged {
                node.unschedulable = false;
                node.annotations.clear_cordon_bookkeeping();
                debug!(node = %node.name, "converged, uncordoning");
                AdvanceOutcome {
                    phase: Phase::Uncordoning,
                    pods_to_evict: Vec::new(),
                }
            } else {
                AdvanceOutcome {
                    phase: Phase::AwaitingApply,
                    pods_to_evict: Vec::new(),
                }
            }
        }

        Phase::TimedOut => AdvanceOutcome {
            phase: Phase::TimedOut,
            pods_to_evict: Vec::new(),
        },

        Phase::Assigning | Phase::Uncordoning => {
            unreachable!("classify_phase never returns an instantaneous-action phase")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mcp_types::NodeAnnotations;

    fn node(name: &str) -> Node {
        Node {
            name: name.to_string(),
            labels: Default::default(),
            annotations: NodeAnnotations::new(),
            unschedulable: false,
        }
    }

    fn ctx(now: DateTime<Utc>, pods: &[Pod]) -> AdvanceContext<'_> {
        AdvanceContext {
            target_revision: "rendered-workers-abc1234567",
            now,
            apply_timeout_seconds: 0,
            drain_timeout: Duration::minutes(10),
            pods,
            eviction_grace: Duration::seconds(30),
        }
    }

    #[test]
    fn admission_cordons_and_sets_unschedulable() {
        let mut n = node("n1");
        let now = Utc::now();
        let outcome = advance(&mut n, true, false, &ctx(now, &[]));
        assert_eq!(outcome.phase, Phase::Cordoning);
        assert!(n.unschedulable);
        assert!(n.annotations.is_cordoned_by_controller());
    }

    #[test]
    fn full_happy_path_reaches_idle_converged() {
        let mut n = node("n1");
        let c = ctx(Utc::now(), &[]);

        advance(&mut n, true, false, &c); // Idle -> Cordoning
        advance(&mut n, false, false, &c); // Cordoning -> Draining
        let outcome = advance(&mut n, false, false, &c); // Draining (empty) -> Assigning
        assert_eq!(outcome.phase, Phase::Assigning);
        assert_eq!(n.annotations.desired_revision(), Some("rendered-workers-abc1234567"));

        // Agent applies.
        n.annotations
            .simulate_agent_report("rendered-workers-abc1234567", AgentState::Done);

        let outcome = advance(&mut n, false, false, &c); // AwaitingApply -> Uncordoning
        assert_eq!(outcome.phase, Phase::Uncordoning);
        assert!(!n.unschedulable);
        assert!(!n.annotations.is_cordoned_by_controller());
        assert!(n.annotations.drain_started_at().is_none());
        assert_eq!(n.annotations.drain_retry_count(), 0);
        assert_eq!(n.annotations.current_revision(), Some("rendered-workers-abc1234567"));

        assert_eq!(classify_phase(&n, Utc::now(), Duration::minutes(10), 0), Phase::Idle);
    }

    #[test]
    fn evictable_pod_blocks_drain_until_removed() {
        let mut n = node("n1");
        let now = Utc::now();
        let pods = vec![Pod::new("user-pod")];
        let c = ctx(now, &pods);

        advance(&mut n, true, false, &c);
        advance(&mut n, false, false, &c); // -> Draining
        let outcome = advance(&mut n, false, false, &c);
        assert_eq!(outcome.phase, Phase::Draining);
        assert_eq!(outcome.pods_to_evict, vec!["user-pod".to_string()]);
        assert!(n.annotations.desired_revision().is_none());

        let empty = ctx(now, &[]);
        let outcome = advance(&mut n, false, false, &empty);
        assert_eq!(outcome.phase, Phase::Assigning);
    }

    #[test]
    fn daemonset_pod_does_not_block_assignment() {
        let mut n = node("n1");
        let now = Utc::now();
        let pods = vec![Pod::daemonset("ds-1")];
        let c = ctx(now, &pods);

        advance(&mut n, true, false, &c);
        advance(&mut n, false, false, &c); // -> Draining
        let outcome = advance(&mut n, false, false, &c);
        assert_eq!(outcome.phase, Phase::Assigning);
        assert_eq!(n.annotations.desired_revision(), Some("rendered-workers-abc1234567"));
    }

    #[test]
    fn drain_exceeding_timeout_is_stuck() {
        let mut n = node("n1");
        let start = Utc::now();
        let pods = vec![Pod::new("user-pod")];
        advance(&mut n, true, false, &ctx(start, &pods));
        advance(&mut n, false, false, &ctx(start, &pods)); // -> Draining, drain_started_at = start

        let later = start + Duration::minutes(11);
        let outcome = advance(&mut n, false, false, &ctx(later, &pods));
        assert_eq!(outcome.phase, Phase::DrainStuck);
    }

    #[test]
    fn apply_timeout_marks_node_timed_out() {
        let mut n = node("n1");
        let start = Utc::now();
        let c = AdvanceContext {
            target_revision: "rendered-workers-abc1234567",
            now: start,
            apply_timeout_seconds: 60,
            drain_timeout: Duration::minutes(10),
            pods: &[],
            eviction_grace: Duration::seconds(30),
        };
        advance(&mut n, true, false, &c);
        advance(&mut n, false, false, &c);
        advance(&mut n, false, false, &c); // assigned, desired_revision_set_at = start

        n.annotations
            .simulate_agent_report("rendered-workers-old", AgentState::Applying);

        let later = start + Duration::minutes(2);
        let phase = classify_phase(&n, later, Duration::minutes(10), 60);
        assert_eq!(phase, Phase::TimedOut);
    }

    #[test]
    fn agent_applying_keeps_node_cordoned_even_if_externally_uncordoned() {
        let mut n = node("n1");
        let now = Utc::now();
        let c = ctx(now, &[]);
        advance(&mut n, true, false, &c);
        advance(&mut n, false, false, &c);
        advance(&mut n, false, false, &c);

        n.unschedulable = false; // externally cleared
        n.annotations
            .simulate_agent_report("rendered-workers-old", AgentState::Applying);

        advance(&mut n, false, false, &c);
        assert!(n.unschedulable, "driver must re-cordon while agent is still applying");
    }
}
