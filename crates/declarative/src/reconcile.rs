//! Desired vs actual classification

use crate::types::{Item, ReconciliationResult};
use std::collections::{HashMap, HashSet};

/// Classify `desired` and `actual` items by name.
///
/// - managed: in both, desired order, metadata merged with actual values
///   winning
/// - missing: desired only, desired order
/// - untracked: actual only, actual order
///
/// Duplicate names keep their first occurrence, so the three lists always
/// partition the union of names.
pub fn reconcile(resource: &str, desired: &[Item], actual: &[Item]) -> ReconciliationResult {
    let actual_by_name: HashMap<&str, &Item> = {
        let mut map = HashMap::with_capacity(actual.len());
        for item in actual {
            map.entry(item.name.as_str()).or_insert(item);
        }
        map
    };

    let mut result = ReconciliationResult {
        resource: resource.to_string(),
        ..Default::default()
    };

    let mut seen_desired = HashSet::with_capacity(desired.len());
    for item in desired {
        if !seen_desired.insert(item.name.as_str()) {
            continue;
        }
        match actual_by_name.get(item.name.as_str()) {
            Some(found) => {
                let mut merged = item.clone();
                merged
                    .metadata
                    .extend(found.metadata.iter().map(|(k, v)| (k.clone(), v.clone())));
                result.managed.push(merged);
            }
            None => result.missing.push(item.clone()),
        }
    }

    let mut seen_actual = HashSet::with_capacity(actual.len());
    for item in actual {
        if seen_desired.contains(item.name.as_str()) || !seen_actual.insert(item.name.as_str()) {
            continue;
        }
        result.untracked.push(item.clone());
    }

    result
}
