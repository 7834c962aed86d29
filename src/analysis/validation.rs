//! Structural checks on hypercubes
//!
//! - [`check_uniqueness`]: positions holding more than one stat
//! - [`check_dimension_values_validity`]: coordinates outside an expected list

use std::collections::{BTreeMap, HashSet};

use tracing::warn;

use crate::hypercube::Hypercube;
use crate::index::StatsIndex;

/// Positions of the hypercube holding several stats
///
/// Keys list the coordinates as `label:value, ...` in sorted label order, an
/// absent coordinate rendered as `label:(absent)` so it stays apart from an
/// empty value. Values are the number of stats at the position. An empty map
/// means every position is unique.
pub fn check_uniqueness(hc: &Hypercube) -> BTreeMap<String, usize> {
    let labels = hc.sorted_labels();
    let index = StatsIndex::build(hc, &labels);

    let mut duplicates = BTreeMap::new();
    index.for_each_terminal(|path, stats| {
        if stats.len() < 2 {
            return;
        }
        let key = path
            .iter()
            .map(|(label, value)| format!("{}:{}", label, value.unwrap_or("(absent)")))
            .collect::<Vec<_>>()
            .join(", ");
        warn!(position = %key, multiplicity = stats.len(), "Non unique position");
        *duplicates.entry(key).or_insert(0) += stats.len();
    });
    duplicates
}

/// Count of every coordinate of `label` not in `expected`
///
/// Stats lacking the coordinate are counted under `None`.
pub fn check_dimension_values_validity<S: AsRef<str>>(
    hc: &Hypercube,
    label: &str,
    expected: &[S],
) -> BTreeMap<Option<String>, usize> {
    let expected: HashSet<&str> = expected.iter().map(AsRef::as_ref).collect();

    let mut unexpected: BTreeMap<Option<String>, usize> = BTreeMap::new();
    for stat in hc {
        let value = stat.dim(label);
        if value.as_deref().map_or(false, |v| expected.contains(v)) {
            continue;
        }
        *unexpected.entry(value).or_default() += 1;
    }

    if !unexpected.is_empty() {
        let summary = unexpected
            .iter()
            .map(|(v, n)| format!("{}: {}", v.as_deref().unwrap_or("(absent)"), n))
            .collect::<Vec<_>>()
            .join(", ");
        warn!(label, values = %summary, "Unexpected dimension values");
    }
    unexpected
}
