//! Multi-dimensional index over a hypercube
//!
//! A [`StatsIndex`] partitions stats by the value of successive dimension
//! labels. With labels `[geo, time]` the root splits on `geo`, each child
//! splits on `time`, and the terminals hold the stats sharing every
//! coordinate: a `Leaf` for exactly one, a `Bag` for several.
//!
//! Stats lacking a coordinate are kept in a separate `absent` branch, so the
//! union of all terminals is always the full set of indexed stats.
//!
//! # Example
//!
//! ```rust
//! use statcube::hypercube::Hypercube;
//! use statcube::index::StatsIndex;
//! use statcube::types::Stat;
//!
//! let mut hc = Hypercube::new(["geo", "time"]);
//! hc.add(Stat::with_dims(1.5, &[("geo", "FR"), ("time", "2020")]));
//! hc.add(Stat::with_dims(2.5, &[("geo", "IT"), ("time", "2020")]));
//!
//! let index = StatsIndex::build(&hc, &["geo", "time"]);
//! assert_eq!(index.single_value(&["IT", "2020"]), 2.5);
//! assert!(index.single_value(&["DE", "2020"]).is_nan());
//! ```

use std::collections::BTreeMap;
use std::fmt;

use tracing::{debug, warn};

use crate::error::IndexError;
use crate::hypercube::Hypercube;
use crate::types::{Stat, StatRef};

/// One step of a path in the index: dimension label and coordinate
pub type PathStep<'a> = (&'a str, Option<&'a str>);

/// Recursive partition of stats by dimension values
#[derive(Debug, Clone, Default)]
pub enum StatsIndex {
    /// No stat
    #[default]
    Empty,
    /// Exactly one stat
    Leaf(StatRef),
    /// Several stats sharing the same coordinates
    Bag(Vec<StatRef>),
    /// Partition on one dimension
    Node(IndexNode),
}

/// Interior level of an index
#[derive(Debug, Clone)]
pub struct IndexNode {
    label: String,
    values: BTreeMap<String, StatsIndex>,
    absent: Option<Box<StatsIndex>>,
}

impl IndexNode {
    /// Dimension label this level splits on
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Children keyed by dimension value
    pub fn children(&self) -> &BTreeMap<String, StatsIndex> {
        &self.values
    }

    /// Child holding the stats lacking the coordinate
    pub fn absent(&self) -> Option<&StatsIndex> {
        self.absent.as_deref()
    }
}

impl StatsIndex {
    /// Index the stats of a hypercube by the given labels, in order
    pub fn build<S: AsRef<str>>(hc: &Hypercube, labels: &[S]) -> Self {
        let labels: Vec<&str> = labels.iter().map(AsRef::as_ref).collect();
        let index = Self::from_stats(hc.stats().to_vec(), &labels);
        debug!(
            stats = hc.len(),
            depth = labels.len(),
            "Built stats index"
        );
        index
    }

    /// Index a list of stat handles by the given labels
    pub fn from_stats(stats: Vec<StatRef>, labels: &[&str]) -> Self {
        let Some((label, rest)) = labels.split_first() else {
            return Self::collapse(stats);
        };
        if stats.is_empty() {
            return StatsIndex::Empty;
        }

        let mut groups: BTreeMap<String, Vec<StatRef>> = BTreeMap::new();
        let mut absent = Vec::new();
        for stat in stats {
            match stat.dim(label) {
                Some(value) => groups.entry(value).or_default().push(stat),
                None => absent.push(stat),
            }
        }

        let values = groups
            .into_iter()
            .map(|(value, group)| (value, Self::from_stats(group, rest)))
            .collect();
        let absent = if absent.is_empty() {
            None
        } else {
            Some(Box::new(Self::from_stats(absent, rest)))
        };

        StatsIndex::Node(IndexNode {
            label: (*label).to_string(),
            values,
            absent,
        })
    }

    fn collapse(mut stats: Vec<StatRef>) -> Self {
        match stats.len() {
            0 => StatsIndex::Empty,
            1 => StatsIndex::Leaf(stats.remove(0)),
            _ => StatsIndex::Bag(stats),
        }
    }

    // ========================================================================
    // Navigation
    // ========================================================================

    /// Label of the root level, if the index is a node
    pub fn label(&self) -> Option<&str> {
        match self {
            StatsIndex::Node(node) => Some(&node.label),
            _ => None,
        }
    }

    fn descend<'a, I>(&self, path: I) -> std::result::Result<Option<&StatsIndex>, IndexError>
    where
        I: IntoIterator<Item = Option<&'a str>>,
    {
        let mut current = self;
        let mut walked: Vec<String> = Vec::new();
        for coord in path {
            walked.push(coord.unwrap_or("").to_string());
            match current {
                StatsIndex::Node(node) => {
                    let next = match coord {
                        Some(value) => node.values.get(value),
                        None => node.absent.as_deref(),
                    };
                    match next {
                        Some(child) => current = child,
                        None => return Ok(None),
                    }
                }
                StatsIndex::Empty => return Ok(None),
                StatsIndex::Leaf(_) | StatsIndex::Bag(_) => {
                    return Err(IndexError::DepthExceeded(walked.join(", ")));
                }
            }
        }
        Ok(Some(current))
    }

    /// Sub-index at a coordinate path
    ///
    /// `None` when a coordinate is not found, or when the path is longer than
    /// the index is deep.
    pub fn sub_index<S: AsRef<str>>(&self, coords: &[S]) -> Option<&StatsIndex> {
        self.sub_index_with_absent(coords.iter().map(|c| Some(c.as_ref())))
    }

    /// Sub-index at a path that may go through absent branches (`None`)
    pub fn sub_index_with_absent<'a, I>(&self, path: I) -> Option<&StatsIndex>
    where
        I: IntoIterator<Item = Option<&'a str>>,
    {
        match self.descend(path) {
            Ok(found) => found,
            Err(e) => {
                warn!(error = %e, "Index lookup went past a terminal");
                None
            }
        }
    }

    /// Single stat at a full coordinate path
    ///
    /// `Ok(None)` when nothing is found, `Err(Ambiguous)` when several stats
    /// share the coordinates.
    pub fn try_lookup<S: AsRef<str>>(
        &self,
        coords: &[S],
    ) -> std::result::Result<Option<StatRef>, IndexError> {
        self.try_lookup_path(coords.iter().map(|c| Some(c.as_ref())))
    }

    fn try_lookup_path<'a, I>(&self, path: I) -> std::result::Result<Option<StatRef>, IndexError>
    where
        I: IntoIterator<Item = Option<&'a str>>,
    {
        let path: Vec<Option<&str>> = path.into_iter().collect();
        match self.descend(path.iter().copied())? {
            Some(StatsIndex::Leaf(stat)) => Ok(Some(stat.clone())),
            Some(StatsIndex::Bag(stats)) => Err(IndexError::Ambiguous {
                path: path
                    .iter()
                    .map(|c| c.unwrap_or(""))
                    .collect::<Vec<_>>()
                    .join(", "),
                multiplicity: stats.len(),
            }),
            _ => Ok(None),
        }
    }

    /// Single stat at a full coordinate path; ambiguity is logged
    pub fn lookup<S: AsRef<str>>(&self, coords: &[S]) -> Option<StatRef> {
        match self.try_lookup(coords) {
            Ok(found) => found,
            Err(e) => {
                warn!(error = %e, "Single stat lookup failed");
                None
            }
        }
    }

    /// Stat sharing the coordinates of `stat` on `labels`, absent ones included
    pub fn lookup_stat<S: AsRef<str>>(
        &self,
        stat: &Stat,
        labels: &[S],
    ) -> std::result::Result<Option<StatRef>, IndexError> {
        self.try_lookup_path(labels.iter().map(|l| stat.get_dim(l.as_ref())))
    }

    /// Value at a coordinate path, NaN if not found or ambiguous
    pub fn single_value<S: AsRef<str>>(&self, coords: &[S]) -> f64 {
        self.lookup(coords).map(|s| s.value()).unwrap_or(f64::NAN)
    }

    /// Value and flags at a coordinate path (e.g. `12.5p`)
    pub fn single_value_flagged<S: AsRef<str>>(&self, coords: &[S]) -> Option<String> {
        self.lookup(coords).map(|s| s.read().value_flagged())
    }

    /// Sorted dimension values at the level below a path
    ///
    /// `None` when the path is not found or ends on a terminal.
    pub fn keys_at<S: AsRef<str>>(&self, coords: &[S]) -> Option<Vec<String>> {
        match self.sub_index(coords)? {
            StatsIndex::Node(node) => Some(node.values.keys().cloned().collect()),
            _ => None,
        }
    }

    /// Every stat below a path
    pub fn collection<S: AsRef<str>>(&self, coords: &[S]) -> Vec<StatRef> {
        self.sub_index(coords)
            .map(|sub| sub.leaves().flat_map(|l| l.iter().cloned()).collect())
            .unwrap_or_default()
    }

    /// Every stat below a path, as a hypercube with the given labels
    pub fn to_hypercube<L: AsRef<str>, S: AsRef<str>>(&self, labels: &[L], coords: &[S]) -> Hypercube {
        Hypercube::from_refs(labels.iter().map(|l| l.as_ref()), self.collection(coords))
    }

    // ========================================================================
    // Traversal
    // ========================================================================

    /// Depth-first iterator over the non-empty terminals
    ///
    /// Children are visited in sorted value order, the absent branch last.
    pub fn leaves(&self) -> Leaves<'_> {
        Leaves { stack: vec![self] }
    }

    /// Visit every non-empty terminal with its path from the root
    pub fn for_each_terminal<'a, F>(&'a self, mut f: F)
    where
        F: FnMut(&[PathStep<'a>], &'a [StatRef]),
    {
        let mut path = Vec::new();
        self.walk(&mut path, &mut f);
    }

    fn walk<'a, F>(&'a self, path: &mut Vec<PathStep<'a>>, f: &mut F)
    where
        F: FnMut(&[PathStep<'a>], &'a [StatRef]),
    {
        match self {
            StatsIndex::Empty => {}
            StatsIndex::Leaf(stat) => f(&path[..], std::slice::from_ref(stat)),
            StatsIndex::Bag(stats) => f(&path[..], stats),
            StatsIndex::Node(node) => {
                for (value, child) in &node.values {
                    path.push((node.label.as_str(), Some(value.as_str())));
                    child.walk(path, f);
                    path.pop();
                }
                if let Some(child) = &node.absent {
                    path.push((node.label.as_str(), None));
                    child.walk(path, f);
                    path.pop();
                }
            }
        }
    }

    /// Number of indexed stats
    pub fn len(&self) -> usize {
        self.leaves().map(<[StatRef]>::len).sum()
    }

    /// Check if the index holds no stat
    pub fn is_empty(&self) -> bool {
        self.leaves().next().is_none()
    }

    /// Number of levels above the terminals
    pub fn depth(&self) -> usize {
        match self {
            StatsIndex::Node(node) => {
                1 + node
                    .values
                    .values()
                    .chain(node.absent.as_deref())
                    .map(StatsIndex::depth)
                    .max()
                    .unwrap_or(0)
            }
            _ => 0,
        }
    }

    fn fmt_indented(&self, f: &mut fmt::Formatter<'_>, indent: usize) -> fmt::Result {
        let pad = " ".repeat(indent);
        match self {
            StatsIndex::Empty => writeln!(f, "{}(empty)", pad),
            StatsIndex::Leaf(stat) => writeln!(f, "{}{}", pad, stat.read().value_flagged()),
            StatsIndex::Bag(stats) => {
                let values: Vec<_> = stats.iter().map(|s| s.read().value_flagged()).collect();
                writeln!(f, "{}[{}] {}", pad, stats.len(), values.join(", "))
            }
            StatsIndex::Node(node) => {
                for (value, child) in &node.values {
                    writeln!(f, "{}{}={}", pad, node.label, value)?;
                    child.fmt_indented(f, indent + 2)?;
                }
                if let Some(child) = &node.absent {
                    writeln!(f, "{}{}=(absent)", pad, node.label)?;
                    child.fmt_indented(f, indent + 2)?;
                }
                Ok(())
            }
        }
    }
}

impl fmt::Display for StatsIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_indented(f, 0)
    }
}

/// Lazy depth-first iterator over index terminals
///
/// Created by [`StatsIndex::leaves`]; restart by calling it again.
pub struct Leaves<'a> {
    stack: Vec<&'a StatsIndex>,
}

impl<'a> Iterator for Leaves<'a> {
    type Item = &'a [StatRef];

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(current) = self.stack.pop() {
            match current {
                StatsIndex::Empty => {}
                StatsIndex::Leaf(stat) => return Some(std::slice::from_ref(stat)),
                StatsIndex::Bag(stats) => return Some(stats.as_slice()),
                StatsIndex::Node(node) => {
                    if let Some(absent) = &node.absent {
                        self.stack.push(absent);
                    }
                    self.stack.extend(node.values.values().rev());
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cube() -> Hypercube {
        let mut hc = Hypercube::new(["geo", "time"]);
        hc.add(Stat::with_dims(1.0, &[("geo", "FR"), ("time", "2020")]));
        hc.add(Stat::with_dims(2.0, &[("geo", "FR"), ("time", "2021")]));
        hc.add(Stat::with_dims(3.0, &[("geo", "IT"), ("time", "2020")]));
        hc.add(Stat::with_dims(4.0, &[("geo", "IT"), ("time", "2020")]));
        hc.add(Stat::with_dims(5.0, &[("time", "2020")]));
        hc
    }

    #[test]
    fn test_build_and_lookup() {
        let index = StatsIndex::build(&cube(), &["geo", "time"]);
        assert_eq!(index.depth(), 2);
        assert_eq!(index.len(), 5);
        assert_eq!(index.single_value(&["FR", "2021"]), 2.0);
        assert!(index.lookup(&["DE", "2020"]).is_none());
    }

    #[test]
    fn test_bag_is_ambiguous() {
        let index = StatsIndex::build(&cube(), &["geo", "time"]);
        assert!(index.lookup(&["IT", "2020"]).is_none());
        assert!(index.single_value(&["IT", "2020"]).is_nan());
        assert_eq!(
            index.try_lookup(&["IT", "2020"]),
            Err(IndexError::Ambiguous {
                path: "IT, 2020".to_string(),
                multiplicity: 2
            })
        );
    }

    #[test]
    fn test_absent_branch() {
        let hc = cube();
        let index = StatsIndex::build(&hc, &["geo", "time"]);
        let lone = &hc.stats()[4];

        let found = index.lookup_stat(&lone.read(), &["geo", "time"]).unwrap();
        assert_eq!(found.as_ref(), Some(lone));
        assert_eq!(index.keys_at::<&str>(&[]), Some(vec!["FR".to_string(), "IT".to_string()]));
    }

    #[test]
    fn test_depth_exceeded() {
        let index = StatsIndex::build(&cube(), &["geo", "time"]);
        assert!(index.sub_index(&["FR", "2020", "extra"]).is_none());
        assert!(matches!(
            index.try_lookup(&["FR", "2020", "extra"]),
            Err(IndexError::DepthExceeded(_))
        ));
        assert!(index.keys_at(&["FR", "2020"]).is_none());
    }

    #[test]
    fn test_collection_and_to_hypercube() {
        let index = StatsIndex::build(&cube(), &["geo", "time"]);
        assert_eq!(index.collection(&["IT"]).len(), 2);
        assert!(index.collection(&["DE"]).is_empty());

        let fr = index.to_hypercube(&["geo", "time"], &["FR"]);
        assert_eq!(fr.len(), 2);
        assert!(fr.has_dim("time"));
    }

    #[test]
    fn test_no_labels_collapses() {
        let hc = cube();
        assert!(matches!(StatsIndex::build(&hc, &[] as &[&str]), StatsIndex::Bag(ref v) if v.len() == 5));

        let mut single = Hypercube::new(["a"]);
        single.add(Stat::new(1.0));
        assert!(matches!(StatsIndex::build(&single, &[] as &[&str]), StatsIndex::Leaf(_)));

        let empty = Hypercube::new(["a"]);
        assert!(matches!(StatsIndex::build(&empty, &["a"]), StatsIndex::Empty));
    }

    #[test]
    fn test_leaves_restartable() {
        let index = StatsIndex::build(&cube(), &["geo", "time"]);
        let sizes: Vec<usize> = index.leaves().map(<[StatRef]>::len).collect();
        assert_eq!(sizes, vec![1, 1, 2, 1]);
        assert_eq!(index.leaves().count(), 4);
    }

    #[test]
    fn test_for_each_terminal_paths() {
        let index = StatsIndex::build(&cube(), &["geo", "time"]);
        let mut paths = Vec::new();
        index.for_each_terminal(|path, stats| {
            let key: Vec<_> = path
                .iter()
                .map(|(l, v)| format!("{}:{}", l, v.unwrap_or("-")))
                .collect();
            paths.push((key.join(","), stats.len()));
        });
        assert_eq!(paths.len(), 4);
        assert_eq!(paths[2], ("geo:IT,time:2020".to_string(), 2));
        assert_eq!(paths[3], ("geo:-,time:2020".to_string(), 1));
    }

    #[test]
    fn test_display() {
        let index = StatsIndex::build(&cube(), &["geo"]);
        let text = index.to_string();
        assert!(text.starts_with("geo=FR\n  [2] 1, 2\n"));
        assert!(text.contains("geo=(absent)\n  5\n"));
    }

    #[test]
    fn test_single_value_flagged() {
        let mut hc = Hypercube::new(["geo"]);
        let mut stat = Stat::with_dims(7.0, &[("geo", "BE")]);
        stat.add_flags_from_codes("p");
        hc.add(stat);
        let index = StatsIndex::build(&hc, &["geo"]);
        assert_eq!(index.single_value_flagged(&["BE"]), Some("7p".to_string()));
        assert_eq!(index.single_value_flagged(&["NL"]), None);
    }
}
