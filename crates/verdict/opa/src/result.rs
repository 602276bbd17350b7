//! Engine result shapes and fan-out item construction.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use verdict_types::{Infraction, PolicyResultItem};

/// Locator for the rule bundle an engine run evaluates against. For the
/// subprocess engine this is a filesystem path; other engines may interpret
/// it as a remote reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleBundleRef {
    pub location: String,
}

impl RuleBundleRef {
    pub fn new(location: impl Into<String>) -> Self {
        Self {
            location: location.into(),
        }
    }
}

impl fmt::Display for RuleBundleRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.location)
    }
}

/// Outcome of one rule package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageResult {
    pub allow: bool,

    #[serde(default, alias = "infraction")]
    pub infractions: Vec<Infraction>,
}

impl PackageResult {
    /// A package that allowed the document.
    pub fn allowed() -> Self {
        Self {
            allow: true,
            infractions: vec![],
        }
    }

    /// A package that denied the document with the given infractions.
    pub fn denied(infractions: Vec<Infraction>) -> Self {
        Self {
            allow: false,
            infractions,
        }
    }
}

/// One engine run's full output: package name to outcome. Ordered so that
/// fan-out index assignment is deterministic.
pub type PolicyResultSet = BTreeMap<String, PackageResult>;

/// Flatten an engine result set into the ordered item list the fan-out runs
/// over. Indices are dense, 0-based, and assigned in package-name order.
pub fn gather_results(results: &PolicyResultSet) -> Vec<PolicyResultItem> {
    results
        .iter()
        .enumerate()
        .map(|(index, (package, result))| PolicyResultItem {
            index,
            package: package.clone(),
            allow: result.allow,
            infractions: result.infractions.clone(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gather_assigns_dense_indices_in_package_order() {
        let mut results = PolicyResultSet::new();
        results.insert("sqs".into(), PackageResult::allowed());
        results.insert(
            "dynamodb".into(),
            PackageResult::denied(vec![Infraction::new("TableA", "no pitr")]),
        );
        results.insert("s3".into(), PackageResult::allowed());

        let items = gather_results(&results);
        assert_eq!(items.len(), 3);
        // BTreeMap order: dynamodb, s3, sqs
        assert_eq!(items[0].package, "dynamodb");
        assert_eq!(items[1].package, "s3");
        assert_eq!(items[2].package, "sqs");
        for (expected, item) in items.iter().enumerate() {
            assert_eq!(item.index, expected);
        }
        assert!(items[0].has_infractions());
        assert!(!items[1].has_infractions());
    }

    #[test]
    fn test_gather_empty_set() {
        let results = PolicyResultSet::new();
        assert!(gather_results(&results).is_empty());
    }

    #[test]
    fn test_package_result_accepts_singular_alias() {
        // Some engine bundles name the field `infraction`; accept both.
        let json = r#"{"allow":false,"infraction":[{"resource":"QueueA","reason":"no dlq","allow":false}]}"#;
        let result: PackageResult = serde_json::from_str(json).unwrap();
        assert!(!result.allow);
        assert_eq!(result.infractions.len(), 1);
        assert_eq!(result.infractions[0].resource, "QueueA");
    }

    #[test]
    fn test_package_result_missing_infractions_defaults_empty() {
        let json = r#"{"allow":true}"#;
        let result: PackageResult = serde_json::from_str(json).unwrap();
        assert!(result.allow);
        assert!(result.infractions.is_empty());
    }
}
