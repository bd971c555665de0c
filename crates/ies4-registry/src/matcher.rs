//! Identity predicates over raw records.

use crate::kind::MatchSpec;
use crate::model::{record_id, record_identifiers, record_names};
use serde_json::Value;
use std::collections::BTreeSet;

/// Decides whether a stored record is the same logical entity.
pub trait IdentityPredicate {
    fn matches(&self, record: &Value) -> bool;
}

impl<F> IdentityPredicate for F
where
    F: Fn(&Value) -> bool,
{
    fn matches(&self, record: &Value) -> bool {
        self(record)
    }
}

/// Matches on id substring, any alias in `names`, or any value in
/// `identifiers`. Comparisons are trimmed and case-insensitive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentityMatcher {
    id_fragment: Option<String>,
    names: BTreeSet<String>,
    identifiers: BTreeSet<String>,
}

fn normalize(s: &str) -> String {
    s.trim().to_lowercase()
}

fn normalized_set(values: &[String]) -> BTreeSet<String> {
    values
        .iter()
        .map(|v| normalize(v))
        .filter(|v| !v.is_empty())
        .collect()
}

impl IdentityMatcher {
    pub fn from_spec(spec: &MatchSpec) -> Self {
        Self {
            id_fragment: spec
                .id_fragment
                .as_deref()
                .map(normalize)
                .filter(|f| !f.is_empty()),
            names: normalized_set(&spec.names),
            identifiers: normalized_set(&spec.identifiers),
        }
    }

    /// A matcher with no criteria never matches anything.
    pub fn is_empty(&self) -> bool {
        self.id_fragment.is_none() && self.names.is_empty() && self.identifiers.is_empty()
    }

    fn matches_id(&self, record: &Value) -> bool {
        match (&self.id_fragment, record_id(record)) {
            (Some(fragment), Some(id)) => id.to_lowercase().contains(fragment.as_str()),
            _ => false,
        }
    }
}

impl IdentityPredicate for IdentityMatcher {
    fn matches(&self, record: &Value) -> bool {
        self.matches_id(record)
            || record_names(record).any(|n| self.names.contains(&normalize(n)))
            || record_identifiers(record).any(|i| self.identifiers.contains(&normalize(i)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn havoc() -> IdentityMatcher {
        IdentityMatcher::from_spec(&MatchSpec {
            id_fragment: Some("mi28".into()),
            names: vec!["Mi-28".into(), "Havoc".into()],
            identifiers: vec!["NATO-HAVOC".into()],
        })
    }

    #[test]
    fn test_matches_each_criterion() {
        let m = havoc();
        assert!(m.matches(&json!({"id": "vehicle-MI28-helicopter-op7-001"})));
        assert!(m.matches(&json!({"id": "x", "names": [{"value": " havoc "}]})));
        assert!(m.matches(&json!({"id": "x", "identifiers": [{"value": "nato-havoc"}]})));
        assert!(!m.matches(&json!({"id": "vehicle-ka52-op7-001", "names": [{"value": "Alligator"}]})));
    }

    #[test]
    fn test_empty_matcher_matches_nothing() {
        let m = IdentityMatcher::from_spec(&MatchSpec {
            id_fragment: Some("  ".into()),
            names: vec!["".into()],
            identifiers: vec![],
        });
        assert!(m.is_empty());
        assert!(!m.matches(&json!({"id": "anything", "names": [{"value": ""}]})));
    }

    #[test]
    fn test_closures_are_predicates() {
        let p = |r: &Value| r.get("id") == Some(&json!("a"));
        assert!(p.matches(&json!({"id": "a"})));
        assert!(!p.matches(&json!({"id": "b"})));
    }
}
