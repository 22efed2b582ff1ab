use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// An equality-based label selector, matched against an object's label map.
///
/// A selector with no entries matches everything (the empty-selector-means-all
/// convention used throughout the data model for pools and fragments).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelSelector {
    #[serde(rename = "matchLabels", default)]
    match_labels: IndexMap<String, String>,
}

impl LabelSelector {
    /// Builds a selector from an explicit set of required label values.
    pub fn new(match_labels: IndexMap<String, String>) -> Self {
        Self { match_labels }
    }

    /// Returns true iff every key/value pair in this selector is present in `labels`.
    pub fn matches(&self, labels: &IndexMap<String, String>) -> bool {
        self.match_labels
            .iter()
            .all(|(k, v)| labels.get(k).is_some_and(|actual| actual == v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(pairs: &[(&str, &str)]) -> IndexMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn empty_selector_matches_everything() {
        let sel = LabelSelector::default();
        assert!(sel.matches(&labels(&[])));
        assert!(sel.matches(&labels(&[("env", "prod")])));
    }

    #[test]
    fn selector_requires_all_pairs() {
        let sel = LabelSelector::new(labels(&[("env", "prod"), ("role", "worker")]));
        assert!(sel.matches(&labels(&[("env", "prod"), ("role", "worker"), ("rack", "a1")])));
        assert!(!sel.matches(&labels(&[("env", "prod")])));
        assert!(!sel.matches(&labels(&[("env", "staging"), ("role", "worker")])));
    }
}
