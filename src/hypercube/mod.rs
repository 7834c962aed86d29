//! Statistical hypercubes
//!
//! A [`Hypercube`] is a bag of [`StatRef`]s plus the set of dimension labels
//! that locate them. Membership is referential: selecting from a cube yields
//! a new cube sharing the same stats, so a value changed through one view is
//! seen by every other view.
//!
//! # Key Components
//!
//! - **Selection** (`selection.rs`): `Criteria` predicates and `select*`
//! - **Operations** (`operations.rs`): structural edits, elementwise and
//!   pairwise transforms, computed copies
//! - **Inspection** (this file): dimension values, cardinalities, summaries,
//!   deterministic row export
//!
//! # Example
//!
//! ```rust
//! use statcube::hypercube::{Criteria, Hypercube};
//! use statcube::types::Stat;
//!
//! let mut hc = Hypercube::new(["geo", "time"]);
//! hc.add(Stat::with_dims(1.0, &[("geo", "FR"), ("time", "2020")]));
//! hc.add(Stat::with_dims(2.0, &[("geo", "IT"), ("time", "2020")]));
//!
//! let fr = hc.select(&Criteria::dim_equal(&[("geo", "FR")]));
//! assert_eq!(fr.len(), 1);
//! assert_eq!(hc.dim_cardinality("geo"), 2);
//! ```

pub mod operations;
pub mod selection;

pub use selection::{CompareOp, Criteria, StatPredicate};

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::aggregation::functions::{self, ValueSummary};
use crate::error::{HypercubeError, Result};
use crate::types::{Stat, StatRef};

/// A collection of statistical values sharing a set of dimension labels
#[derive(Debug, Clone, Default)]
pub struct Hypercube {
    stats: Vec<StatRef>,
    members: HashSet<StatRef>,
    dim_labels: BTreeSet<String>,
}

impl Hypercube {
    /// Create an empty hypercube with the given dimension labels
    pub fn new<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            stats: Vec::new(),
            members: HashSet::new(),
            dim_labels: labels.into_iter().map(Into::into).collect(),
        }
    }

    /// Create a hypercube owning new stats
    pub fn from_stats<I, S>(labels: I, stats: Vec<Stat>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut hc = Self::new(labels);
        for stat in stats {
            hc.add(stat);
        }
        hc
    }

    /// Create a hypercube over existing stat handles
    ///
    /// Duplicate handles are kept once.
    pub fn from_refs<I, S>(labels: I, stats: impl IntoIterator<Item = StatRef>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut hc = Self::new(labels);
        for stat in stats {
            hc.insert(stat);
        }
        hc
    }

    /// Add a new stat, returning its handle
    pub fn add(&mut self, stat: Stat) -> StatRef {
        let handle = StatRef::new(stat);
        self.insert(handle.clone());
        handle
    }

    /// Insert a stat handle; returns false if it is already a member
    pub fn insert(&mut self, stat: StatRef) -> bool {
        if !self.members.insert(stat.clone()) {
            return false;
        }
        self.stats.push(stat);
        true
    }

    /// Remove a stat handle; returns false if it was not a member
    ///
    /// Use [`Hypercube::remove_all`] to drop many stats in one pass.
    pub fn remove(&mut self, stat: &StatRef) -> bool {
        if !self.members.remove(stat) {
            return false;
        }
        if let Some(pos) = self.stats.iter().position(|s| s.ptr_eq(stat)) {
            self.stats.remove(pos);
        }
        true
    }

    /// Remove several stat handles in a single pass, keeping the order of
    /// the others; returns the number removed
    pub fn remove_all<'a, I>(&mut self, stats: I) -> usize
    where
        I: IntoIterator<Item = &'a StatRef>,
    {
        let removed: HashSet<StatRef> = stats
            .into_iter()
            .filter(|s| self.members.remove(*s))
            .cloned()
            .collect();
        if !removed.is_empty() {
            self.stats.retain(|s| !removed.contains(s));
        }
        removed.len()
    }

    /// Keep only the stats matching a predicate
    pub(crate) fn retain<F>(&mut self, mut keep: F)
    where
        F: FnMut(&Stat) -> bool,
    {
        let members = &mut self.members;
        self.stats.retain(|s| {
            let kept = keep(&s.read());
            if !kept {
                members.remove(s);
            }
            kept
        });
    }

    /// Stat handles in insertion order
    pub fn stats(&self) -> &[StatRef] {
        &self.stats
    }

    /// Iterate over stat handles
    pub fn iter(&self) -> std::slice::Iter<'_, StatRef> {
        self.stats.iter()
    }

    /// Check membership of a handle
    pub fn contains(&self, stat: &StatRef) -> bool {
        self.members.contains(stat)
    }

    /// Number of stats
    pub fn len(&self) -> usize {
        self.stats.len()
    }

    /// Check if the cube holds no stat
    pub fn is_empty(&self) -> bool {
        self.stats.is_empty()
    }

    /// Dimension labels
    pub fn dim_labels(&self) -> &BTreeSet<String> {
        &self.dim_labels
    }

    /// Dimension labels in sorted order
    pub fn sorted_labels(&self) -> Vec<String> {
        self.dim_labels.iter().cloned().collect()
    }

    /// Check if a label is a dimension of the cube
    pub fn has_dim(&self, label: &str) -> bool {
        self.dim_labels.contains(label)
    }

    /// Declare a dimension label
    pub fn add_dim_label(&mut self, label: impl Into<String>) -> bool {
        self.dim_labels.insert(label.into())
    }

    pub(crate) fn dim_labels_mut(&mut self) -> &mut BTreeSet<String> {
        &mut self.dim_labels
    }

    // ========================================================================
    // Selection
    // ========================================================================

    /// Stats matching the criteria, as a new cube sharing the same stats
    pub fn select(&self, criteria: &Criteria) -> Hypercube {
        let stats = self
            .stats
            .iter()
            .filter(|s| criteria.keep(&s.read()))
            .cloned()
            .collect::<Vec<_>>();
        Hypercube {
            members: stats.iter().cloned().collect(),
            stats,
            dim_labels: self.dim_labels.clone(),
        }
    }

    /// Stats whose coordinates equal every `(label, value)` pair
    pub fn select_dim_equal(&self, pairs: &[(&str, &str)]) -> Hypercube {
        self.select(&Criteria::dim_equal(pairs))
    }

    /// Stats whose coordinates differ from every `(label, value)` pair
    pub fn select_dim_different(&self, pairs: &[(&str, &str)]) -> Hypercube {
        self.select(&Criteria::dim_different(pairs))
    }

    /// Stats whose value compares with a constant
    pub fn select_value(&self, op: CompareOp, threshold: f64) -> Hypercube {
        self.select(&Criteria::value(op, threshold))
    }

    /// Stats with a defined (non NaN) value
    pub fn select_value_defined(&self) -> Hypercube {
        self.select(&Criteria::ValueDefined)
    }

    /// Stats whose coordinate parses as a number comparing with a constant
    pub fn select_dim_numeric(&self, label: &str, op: CompareOp, threshold: f64) -> Hypercube {
        self.select(&Criteria::dim_numeric(label, op, threshold))
    }

    // ========================================================================
    // Inspection
    // ========================================================================

    /// Distinct values of a dimension, sorted; absent coordinates are not listed
    pub fn dim_values(&self, label: &str) -> BTreeSet<String> {
        self.stats.iter().filter_map(|s| s.dim(label)).collect()
    }

    /// Distinct values of a dimension in order of first occurrence
    pub fn dim_values_ordered(&self, label: &str) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for s in &self.stats {
            if let Some(v) = s.dim(label) {
                if seen.insert(v.clone()) {
                    out.push(v);
                }
            }
        }
        out
    }

    /// Number of distinct values of a dimension
    ///
    /// A missing coordinate counts as one more distinct value.
    pub fn dim_cardinality(&self, label: &str) -> usize {
        let values: HashSet<Option<String>> = self.stats.iter().map(|s| s.dim(label)).collect();
        values.len()
    }

    /// Defined values
    pub fn values(&self) -> Vec<f64> {
        self.stats
            .iter()
            .map(StatRef::value)
            .filter(|v| !v.is_nan())
            .collect()
    }

    /// Descriptive statistics over the defined values
    pub fn summary(&self) -> ValueSummary {
        ValueSummary::from_values(&self.values())
    }

    /// `n` values splitting the defined values into `n + 1` groups
    pub fn quantiles(&self, n: usize) -> Vec<f64> {
        functions::quantiles(&self.values(), n)
    }

    /// Overview of the cube: size and cardinality of every dimension
    pub fn info(&self) -> HypercubeInfo {
        let dimensions = self
            .dim_labels
            .iter()
            .map(|label| DimensionInfo {
                label: label.clone(),
                cardinality: self.dim_cardinality(label),
                values: self.dim_values(label).into_iter().collect(),
            })
            .collect();
        HypercubeInfo {
            size: self.stats.len(),
            dimensions,
        }
    }

    /// Values of a one-dimensional cube keyed by coordinate
    ///
    /// Stats lacking the coordinate are skipped; on duplicate coordinates the
    /// last stat wins.
    pub fn to_map(&self) -> Result<BTreeMap<String, f64>> {
        if self.dim_labels.len() != 1 {
            return Err(HypercubeError::NotOneDimensional(self.dim_labels.len()).into());
        }
        let label = self.sorted_labels().remove(0);
        Ok(self
            .stats
            .iter()
            .filter_map(|s| {
                let stat = s.read();
                stat.get_dim(&label).map(|k| (k.to_string(), stat.value))
            })
            .collect())
    }

    /// Rows sorted by coordinates, for export
    ///
    /// `order` sets the column order; when empty the sorted dimension labels
    /// are used.
    pub fn rows<S: AsRef<str>>(&self, order: &[S]) -> Vec<StatRow> {
        let labels: Vec<String> = if order.is_empty() {
            self.sorted_labels()
        } else {
            order.iter().map(|s| s.as_ref().to_string()).collect()
        };
        let mut rows: Vec<StatRow> = self
            .stats
            .iter()
            .map(|s| {
                let stat = s.read();
                StatRow {
                    coords: stat.dim_values(&labels),
                    value: stat.value,
                    flags: stat.flags_string(),
                }
            })
            .collect();
        rows.sort_by(|a, b| a.coords.cmp(&b.coords));
        rows
    }
}

impl<'a> IntoIterator for &'a Hypercube {
    type Item = &'a StatRef;
    type IntoIter = std::slice::Iter<'a, StatRef>;

    fn into_iter(self) -> Self::IntoIter {
        self.stats.iter()
    }
}

// ============================================================================
// Inspection types
// ============================================================================

/// One exported row: coordinates in column order, value and flag codes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatRow {
    /// Coordinates, `None` when the stat lacks the dimension
    pub coords: Vec<Option<String>>,
    /// Value (NaN when missing)
    pub value: f64,
    /// Flag codes
    pub flags: String,
}

/// Size and dimensions of a hypercube
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HypercubeInfo {
    /// Number of stats
    pub size: usize,
    /// One entry per dimension label, sorted by label
    pub dimensions: Vec<DimensionInfo>,
}

/// Description of one dimension
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DimensionInfo {
    /// Dimension label
    pub label: String,
    /// Distinct values, absent included
    pub cardinality: usize,
    /// Sorted distinct values
    pub values: Vec<String>,
}

impl fmt::Display for HypercubeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Information on hypercube:")?;
        writeln!(f, "   {} dimensions", self.dimensions.len())?;
        writeln!(f, "   {} values", self.size)?;
        for dim in &self.dimensions {
            writeln!(f, "   Dimension: {} ({} dimension values)", dim.label, dim.cardinality)?;
            for value in &dim.values {
                writeln!(f, "      {}", value)?;
            }
        }
        Ok(())
    }
}

impl fmt::Display for Hypercube {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for stat in &self.stats {
            writeln!(f, "{}", stat)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Hypercube {
        let mut hc = Hypercube::new(["geo", "time"]);
        hc.add(Stat::with_dims(1.0, &[("geo", "FR"), ("time", "2020")]));
        hc.add(Stat::with_dims(2.0, &[("geo", "FR"), ("time", "2021")]));
        hc.add(Stat::with_dims(3.0, &[("geo", "IT"), ("time", "2020")]));
        hc.add(Stat::with_dims(f64::NAN, &[("geo", "IT"), ("time", "2021")]));
        hc
    }

    #[test]
    fn test_insert_is_referential() {
        let mut hc = Hypercube::new(["a"]);
        let stat = Stat::with_dims(1.0, &[("a", "x")]);
        let r = hc.add(stat.clone());
        assert!(!hc.insert(r.clone()));
        assert!(hc.insert(StatRef::new(stat)));
        assert_eq!(hc.len(), 2);
        assert!(hc.remove(&r));
        assert!(!hc.remove(&r));
        assert_eq!(hc.len(), 1);
    }

    #[test]
    fn test_remove_all_keeps_order() {
        let mut hc = sample();
        let fr = hc.select_dim_equal(&[("geo", "FR")]);
        let stranger = StatRef::new(Stat::new(9.0));

        let removed = hc.remove_all(fr.stats().iter().chain([&stranger]));
        assert_eq!(removed, 2);
        assert_eq!(hc.len(), 2);
        assert_eq!(hc.stats()[0].value(), 3.0);
        assert!(hc.stats()[1].value().is_nan());
        assert!(!hc.contains(&fr.stats()[0]));
        assert_eq!(hc.remove_all(fr.stats()), 0);
    }

    #[test]
    fn test_select_shares_stats() {
        let hc = sample();
        let fr = hc.select_dim_equal(&[("geo", "FR")]);
        assert_eq!(fr.len(), 2);
        assert_eq!(fr.dim_labels(), hc.dim_labels());

        fr.stats()[0].set_value(10.0);
        assert_eq!(hc.stats()[0].value(), 10.0);
    }

    #[test]
    fn test_select_variants() {
        let hc = sample();
        assert_eq!(hc.select_dim_different(&[("geo", "FR")]).len(), 2);
        assert_eq!(hc.select_value(CompareOp::Ge, 2.0).len(), 2);
        assert_eq!(hc.select_value_defined().len(), 3);
        assert_eq!(hc.select_dim_numeric("time", CompareOp::Gt, 2020.0).len(), 2);
    }

    #[test]
    fn test_cardinality_counts_absent() {
        let mut hc = sample();
        assert_eq!(hc.dim_cardinality("geo"), 2);
        hc.add(Stat::with_dims(4.0, &[("time", "2020")]));
        assert_eq!(hc.dim_cardinality("geo"), 3);
        assert_eq!(hc.dim_values("geo").len(), 2);
    }

    #[test]
    fn test_dim_values_ordered() {
        let hc = sample();
        assert_eq!(hc.dim_values_ordered("time"), vec!["2020", "2021"]);
    }

    #[test]
    fn test_values_skip_nan() {
        let hc = sample();
        assert_eq!(hc.values(), vec![1.0, 2.0, 3.0]);
        let summary = hc.summary();
        assert_eq!(summary.count, 3);
        assert!((summary.mean - 2.0).abs() < 0.001);
    }

    #[test]
    fn test_to_map() {
        let hc = sample();
        assert!(matches!(
            hc.to_map(),
            Err(crate::Error::Hypercube(HypercubeError::NotOneDimensional(2)))
        ));

        let mut one = Hypercube::new(["time"]);
        one.add(Stat::with_dims(5.0, &[("time", "2020")]));
        one.add(Stat::with_dims(6.0, &[("time", "2021")]));
        let map = one.to_map().unwrap();
        assert_eq!(map.get("2021"), Some(&6.0));
    }

    #[test]
    fn test_rows_sorted() {
        let hc = sample();
        let rows = hc.rows(&["time", "geo"]);
        let keys: Vec<_> = rows
            .iter()
            .map(|r| r.coords.iter().flatten().cloned().collect::<Vec<_>>().join("/"))
            .collect();
        assert_eq!(keys, vec!["2020/FR", "2020/IT", "2021/FR", "2021/IT"]);

        let default_order = hc.rows::<&str>(&[]);
        assert_eq!(default_order[0].coords[0].as_deref(), Some("FR"));
    }

    #[test]
    fn test_info_display() {
        let info = sample().info();
        assert_eq!(info.size, 4);
        assert_eq!(info.dimensions[0].label, "geo");
        let text = info.to_string();
        assert!(text.contains("2 dimensions"));
        assert!(text.contains("Dimension: time (2 dimension values)"));
    }
}
