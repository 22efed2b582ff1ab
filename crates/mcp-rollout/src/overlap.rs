use std::collections::BTreeMap;

use mcp_types::{Condition, ConditionStatus, ConditionType, Node, Pool};

/// Maps each node name that matched more than one pool to the sorted names
/// of every pool that matched it.
pub type OverlapMap = BTreeMap<String, Vec<String>>;

/// Computes, for every node, the set of pools whose `nodeSelector` matches
/// it, and returns only the nodes matched by two or more pools (component C3).
pub fn detect_overlaps(pools: &[Pool], nodes: &[Node]) -> OverlapMap {
    let mut matches: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for node in nodes {
        let mut matching_pools: Vec<String> = pools
            .iter()
            .filter(|pool| pool.spec.node_selector.matches(&node.labels))
            .map(|pool| pool.name.clone())
            .collect();
        matching_pools.sort();
        if matching_pools.len() > 1 {
            matches.insert(node.name.clone(), matching_pools);
        }
    }
    matches
}

/// Builds the `PoolOverlap=True` condition for a pool found in `overlaps`,
/// listing the conflicting node names in the message per §4.3. A pool with
/// `PoolOverlap=True` also always carries `Degraded=True`.
pub fn overlap_condition(pool_name: &str, overlaps: &OverlapMap) -> Option<Condition> {
    let mut conflicting: Vec<&str> = overlaps
        .iter()
        .filter(|(_, pool_names)| pool_names.iter().any(|p| p == pool_name))
        .map(|(node_name, _)| node_name.as_str())
        .collect();
    if conflicting.is_empty() {
        return None;
    }
    conflicting.sort_unstable();
    Some(Condition::new(
        ConditionType::PoolOverlap,
        ConditionStatus::True,
        "NodesInMultiplePools",
        format!("nodes claimed by multiple pools: {}", conflicting.join(", ")),
    ))
}

/// True iff `node_name` was matched by more than one pool.
pub fn is_overlapped(node_name: &str, overlaps: &OverlapMap) -> bool {
    overlaps.contains_key(node_name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::indexmap;
    use mcp_types::{
        LabelSelector, MaxUnavailable, NodeAnnotations, PoolSpec, PoolStatus, RebootPolicy,
        RebootStrategy,
    };

    fn pool(name: &str, selector_labels: &[(&str, &str)]) -> Pool {
        Pool {
            name: name.to_string(),
            labels: Default::default(),
            spec: PoolSpec {
                node_selector: LabelSelector::new(
                    selector_labels
                        .iter()
                        .map(|(k, v)| (k.to_string(), v.to_string()))
                        .collect(),
                ),
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

    fn node(name: &str, labels: &[(&str, &str)]) -> Node {
        Node {
            name: name.to_string(),
            labels: labels.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
            annotations: NodeAnnotations::new(),
            unschedulable: false,
        }
    }

    #[test]
    fn node_matched_by_two_pools_is_reported_for_both() {
        let pools = vec![
            pool("p1", &[("env", "prod")]),
            pool("p2", &[("env", "prod")]),
        ];
        let nodes = vec![node("n1", &[("env", "prod")])];

        let overlaps = detect_overlaps(&pools, &nodes);
        assert_eq!(overlaps.get("n1"), Some(&vec!["p1".to_string(), "p2".to_string()]));

        assert!(overlap_condition("p1", &overlaps).is_some());
        assert!(overlap_condition("p2", &overlaps).is_some());
    }

    #[test]
    fn node_matched_by_one_pool_is_not_overlapping() {
        let pools = vec![pool("p1", &[("env", "prod")])];
        let nodes = vec![node("n1", &[("env", "prod")])];
        let overlaps = detect_overlaps(&pools, &nodes);
        assert!(overlaps.is_empty());
        assert!(overlap_condition("p1", &overlaps).is_none());
    }

    #[test]
    fn overlap_message_lists_node_names_sorted() {
        let pools = vec![
            pool("p1", &[("env", "prod")]),
            pool("p2", &[("env", "prod")]),
        ];
        let nodes = vec![node("z-node", &[("env", "prod")]), node("a-node", &[("env", "prod")])];
        let overlaps = detect_overlaps(&pools, &nodes);
        let condition = overlap_condition("p1", &overlaps).unwrap();
        assert!(condition.message.find("a-node").unwrap() < condition.message.find("z-node").unwrap());
    }

    #[test]
    fn indexmap_selector_from_pairs() {
        let selector = LabelSelector::new(indexmap! { "env".to_string() => "prod".to_string() });
        assert!(selector.matches(&indexmap! { "env".to_string() => "prod".to_string() }));
    }
}
