use std::collections::BTreeSet;

use mcp_types::RenderedRevision;

use crate::fetcher::RevisionFetcher;

/// How a reboot decision was reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecisionMethod {
    /// `previousRevisionName` was empty: first apply to this node.
    LegacyFirstApply,
    /// Previous and new revision names are identical: never requires a reboot.
    SameRevision,
    /// Both revisions carry populated `rebootRequirements`: diffed resource-by-resource.
    DiffBased,
    /// Fetch failed, or neither revision populated `rebootRequirements`: falls
    /// back to the new revision's OR-folded legacy hint.
    LegacyFallback,
}

/// The outcome of a reboot decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    pub required: bool,
    pub method: DecisionMethod,
    /// Human-readable reasons, sorted files-then-units, each name-sorted.
    pub reasons: Vec<String>,
}

/// Decides whether a node must reboot to move from `previous_revision_name`
/// to `new_revision`, per §4.2.
pub fn decide(
    previous_revision_name: &str,
    new_revision: &RenderedRevision,
    fetcher: &dyn RevisionFetcher,
) -> Decision {
    if previous_revision_name.is_empty() {
        return Decision {
            required: new_revision.reboot.required,
            method: DecisionMethod::LegacyFirstApply,
            reasons: Vec::new(),
        };
    }

    if previous_revision_name == new_revision.name {
        return Decision {
            required: false,
            method: DecisionMethod::SameRevision,
            reasons: Vec::new(),
        };
    }

    let previous = match fetcher.fetch(previous_revision_name) {
        Ok(previous) => previous,
        Err(_) => {
            return Decision {
                required: new_revision.reboot.required,
                method: DecisionMethod::LegacyFallback,
                reasons: Vec::new(),
            }
        }
    };

    let either_populated =
        !previous.reboot_requirements.is_empty() || !new_revision.reboot_requirements.is_empty();

    if !either_populated {
        return Decision {
            required: new_revision.reboot.required,
            method: DecisionMethod::LegacyFallback,
            reasons: Vec::new(),
        };
    }

    diff_based(&previous, new_revision)
}

fn diff_based(previous: &RenderedRevision, new_revision: &RenderedRevision) -> Decision {
    let mut reasons = Vec::new();
    let mut required = false;

    let mut file_paths: BTreeSet<&String> = BTreeSet::new();
    file_paths.extend(previous.config.files.keys());
    file_paths.extend(new_revision.config.files.keys());
    for path in file_paths {
        let changed = previous.config.files.get(path) != new_revision.config.files.get(path);
        if !changed {
            continue;
        }
        let flagged = previous.reboot_requirements.files.get(path).copied().unwrap_or(false)
            || new_revision.reboot_requirements.files.get(path).copied().unwrap_or(false);
        if flagged {
            required = true;
            reasons.push(format!("file {path} requires reboot"));
        }
    }

    let mut unit_names: BTreeSet<&String> = BTreeSet::new();
    unit_names.extend(previous.config.units.keys());
    unit_names.extend(new_revision.config.units.keys());
    for name in unit_names {
        let changed = previous.config.units.get(name) != new_revision.config.units.get(name);
        if !changed {
            continue;
        }
        let flagged = previous.reboot_requirements.units.get(name).copied().unwrap_or(false)
            || new_revision.reboot_requirements.units.get(name).copied().unwrap_or(false);
        if flagged {
            required = true;
            reasons.push(format!("unit {name} requires reboot"));
        }
    }

    Decision {
        required,
        method: DecisionMethod::DiffBased,
        reasons,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::indexmap;
    use mcp_types::{FileEntry, RebootRequirements, RebootStrategy, RevisionConfig, RevisionRebootPolicy};

    struct FakeFetcher(Option<RenderedRevision>);

    impl RevisionFetcher for FakeFetcher {
        fn fetch(&self, _name: &str) -> Result<RenderedRevision, crate::FetchError> {
            self.0
                .clone()
                .ok_or_else(|| crate::FetchError("not found".to_string()))
        }
    }

    fn revision(name: &str, required: bool) -> RenderedRevision {
        RenderedRevision {
            name: name.to_string(),
            pool_name: "workers".to_string(),
            revision: name.to_string(),
            config_hash: "x".repeat(64),
            config: RevisionConfig::default(),
            reboot: RevisionRebootPolicy {
                strategy: RebootStrategy::IfRequired,
                required,
                min_interval_seconds: 0,
            },
            reboot_requirements: RebootRequirements::default(),
        }
    }

    #[test]
    fn empty_previous_is_legacy_first_apply() {
        let new_revision = revision("rendered-workers-abc", true);
        let decision = decide("", &new_revision, &FakeFetcher(None));
        assert_eq!(decision.method, DecisionMethod::LegacyFirstApply);
        assert!(decision.required);
    }

    #[test]
    fn same_name_never_requires_reboot_even_if_flagged() {
        let new_revision = revision("rendered-workers-abc", true);
        let decision = decide("rendered-workers-abc", &new_revision, &FakeFetcher(None));
        assert_eq!(decision.method, DecisionMethod::SameRevision);
        assert!(!decision.required);
    }

    #[test]
    fn fetch_failure_falls_back_to_legacy_hint() {
        let new_revision = revision("rendered-workers-new", true);
        let decision = decide("rendered-workers-old", &new_revision, &FakeFetcher(None));
        assert_eq!(decision.method, DecisionMethod::LegacyFallback);
        assert!(decision.required);
    }

    #[test]
    fn neither_side_populated_falls_back_to_legacy_hint() {
        let previous = revision("rendered-workers-old", false);
        let mut new_revision = revision("rendered-workers-new", false);
        new_revision.reboot.required = true;
        let decision = decide(
            "rendered-workers-old",
            &new_revision,
            &FakeFetcher(Some(previous)),
        );
        assert_eq!(decision.method, DecisionMethod::LegacyFallback);
        assert!(decision.required);
    }

    #[test]
    fn file_change_flagged_by_either_side_requires_reboot() {
        let mut previous = revision("rendered-workers-old", false);
        previous.config.files.insert(
            "/etc/kernel.conf".to_string(),
            FileEntry {
                content: "old".to_string(),
                mode: 0o644,
                owner: None,
                group: None,
            },
        );
        previous.reboot_requirements.files = indexmap! { "/etc/kernel.conf".to_string() => true };

        let mut new_revision = revision("rendered-workers-new", false);
        new_revision.config.files.insert(
            "/etc/kernel.conf".to_string(),
            FileEntry {
                content: "new".to_string(),
                mode: 0o644,
                owner: None,
                group: None,
            },
        );

        let decision = decide(
            "rendered-workers-old",
            &new_revision,
            &FakeFetcher(Some(previous)),
        );
        assert_eq!(decision.method, DecisionMethod::DiffBased);
        assert!(decision.required);
        assert_eq!(decision.reasons, vec!["file /etc/kernel.conf requires reboot".to_string()]);
    }

    #[test]
    fn unchanged_resource_does_not_emit_a_reason() {
        let mut previous = revision("rendered-workers-old", false);
        let entry = FileEntry {
            content: "same".to_string(),
            mode: 0o644,
            owner: None,
            group: None,
        };
        previous.config.files.insert("/etc/test.conf".to_string(), entry.clone());
        previous.reboot_requirements.files = indexmap! { "/etc/test.conf".to_string() => true };

        let mut new_revision = revision("rendered-workers-new", false);
        new_revision.config.files.insert("/etc/test.conf".to_string(), entry);
        new_revision.reboot_requirements.files = indexmap! { "/etc/test.conf".to_string() => true };

        let decision = decide(
            "rendered-workers-old",
            &new_revision,
            &FakeFetcher(Some(previous)),
        );
        assert!(!decision.required);
        assert!(decision.reasons.is_empty());
    }
}
