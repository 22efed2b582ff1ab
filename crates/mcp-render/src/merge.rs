use indexmap::IndexMap;
use mcp_types::{ConfigFragment, FileEntry, RebootRequirements, RevisionConfig, UnitEntry};

/// Merges fragments into a canonical [`RevisionConfig`] plus the OR-folded
/// [`RebootRequirements`] map, following the pool's selected fragment set.
///
/// Fragments are sorted ascending by `(priority, name)` first, so a later
/// write in that order always wins — higher priority overrides lower, and
/// ties break lexicographically by name. The merge is a pure function of
/// `fragments`: it does not look at the pool beyond having already been
/// filtered to fragments whose selector matches it.
pub fn merge_fragments(fragments: &[ConfigFragment]) -> (RevisionConfig, RebootRequirements) {
    let mut ordered: Vec<&ConfigFragment> = fragments.iter().collect();
    ordered.sort_by(|a, b| (a.priority, &a.name).cmp(&(b.priority, &b.name)));

    let mut files: IndexMap<String, FileEntry> = IndexMap::new();
    let mut units: IndexMap<String, UnitEntry> = IndexMap::new();
    let mut kernel_args: Vec<String> = Vec::new();
    let mut reboot_files: IndexMap<String, bool> = IndexMap::new();
    let mut reboot_units: IndexMap<String, bool> = IndexMap::new();

    for fragment in ordered {
        for file in &fragment.files {
            files.insert(
                file.path.clone(),
                FileEntry {
                    content: file.content.clone(),
                    mode: file.mode,
                    owner: file.owner.clone(),
                    group: file.group.clone(),
                },
            );
        }
        for unit in &fragment.units {
            units.insert(
                unit.name.clone(),
                UnitEntry {
                    content: unit.content.clone(),
                    desired_state: unit.desired_state,
                },
            );
        }
        for arg in &fragment.kernel_args {
            if !kernel_args.contains(arg) {
                kernel_args.push(arg.clone());
            }
        }
        for (path, required) in &fragment.reboot_hints.files {
            let entry = reboot_files.entry(path.clone()).or_insert(false);
            *entry = *entry || *required;
        }
        for (name, required) in &fragment.reboot_hints.units {
            let entry = reboot_units.entry(name.clone()).or_insert(false);
            *entry = *entry || *required;
        }
    }

    files.sort_keys();
    units.sort_keys();
    reboot_files.sort_keys();
    reboot_units.sort_keys();

    (
        RevisionConfig {
            files,
            units,
            kernel_args,
        },
        RebootRequirements {
            files: reboot_files,
            units: reboot_units,
        },
    )
}
