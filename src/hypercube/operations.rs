//! Structural edits and value transforms on hypercubes
//!
//! Mutating operations change the stats in place, so every view sharing them
//! sees the change. They return `&mut Self` for chaining. Computed operations
//! leave the source untouched and build a new hypercube of new stats.
//!
//! # Pairwise Operations
//!
//! Combining two hypercubes requires identical label sets. The right-hand
//! cube is indexed on the sorted labels and each left stat looks up the stat
//! with the same coordinates. A missing or ambiguous match gives NaN.

use std::collections::HashSet;

use tracing::{debug, warn};

use crate::error::{HypercubeError, Result};
use crate::index::StatsIndex;
use crate::types::{Stat, StatRef};

use super::Hypercube;

impl Hypercube {
    // ========================================================================
    // Structural edits
    // ========================================================================

    /// Remove a dimension from every stat and from the labels
    ///
    /// If some stats lacked the coordinate, the removal still completes and
    /// `MissingCoordinate` is returned.
    pub fn delete_dim(&mut self, label: &str) -> Result<&mut Self> {
        let mut missing = 0;
        for stat in self.iter() {
            if stat.write().remove_dim(label).is_none() {
                missing += 1;
            }
        }
        self.dim_labels_mut().remove(label);

        if missing > 0 {
            warn!(label, missing, "Dimension not defined for some stats");
            return Err(HypercubeError::MissingCoordinate {
                label: label.to_string(),
                missing,
            }
            .into());
        }
        Ok(self)
    }

    /// Remove every stat having a coordinate value
    pub fn delete_dim_value(&mut self, label: &str, value: &str) -> &mut Self {
        self.retain(|s| s.get_dim(label) != Some(value));
        self
    }

    /// Remove every stat whose coordinate has `len` characters
    pub fn delete_dim_values_with_length(&mut self, label: &str, len: usize) -> &mut Self {
        self.retain(|s| s.get_dim(label).map_or(true, |v| v.chars().count() != len));
        self
    }

    /// Drop the dimensions with at most one value
    pub fn shrink(&mut self) -> &mut Self {
        let flat: Vec<String> = self
            .dim_labels()
            .iter()
            .filter(|l| self.dim_cardinality(l) <= 1)
            .cloned()
            .collect();
        for label in flat {
            debug!(label = %label, "Shrinking dimension");
            for stat in self.iter() {
                stat.write().remove_dim(&label);
            }
            self.dim_labels_mut().remove(&label);
        }
        self
    }

    /// Rename a dimension label on the cube and on every stat
    pub fn rename_dim(&mut self, from: &str, to: &str) -> Result<&mut Self> {
        if !self.has_dim(from) {
            return Err(HypercubeError::UnknownDimension(from.to_string()).into());
        }
        if self.has_dim(to) {
            return Err(HypercubeError::DimensionExists(to.to_string()).into());
        }

        let mut missing = 0;
        for stat in self.iter() {
            let mut stat = stat.write();
            match stat.remove_dim(from) {
                Some(value) => {
                    stat.set_dim(to, value);
                }
                None => missing += 1,
            }
        }
        let labels = self.dim_labels_mut();
        labels.remove(from);
        labels.insert(to.to_string());

        if missing > 0 {
            return Err(HypercubeError::MissingCoordinate {
                label: from.to_string(),
                missing,
            }
            .into());
        }
        Ok(self)
    }

    /// Replace a coordinate value on every stat having it
    pub fn replace_dim_value(&mut self, label: &str, from: &str, to: &str) -> &mut Self {
        for stat in self.iter() {
            let mut stat = stat.write();
            if stat.get_dim(label) == Some(from) {
                stat.set_dim(label, to);
            }
        }
        self
    }

    // ========================================================================
    // Elementwise transforms
    // ========================================================================

    /// Replace every value `v` by `f(v)`
    pub fn apply<F>(&mut self, f: F) -> &mut Self
    where
        F: Fn(f64) -> f64,
    {
        for stat in self.iter() {
            let mut stat = stat.write();
            stat.value = f(stat.value);
        }
        self
    }

    /// `-v`
    pub fn apply_negate(&mut self) -> &mut Self {
        self.apply(|v| -v)
    }

    /// `|v|`
    pub fn apply_abs(&mut self) -> &mut Self {
        self.apply(f64::abs)
    }

    /// `v + k`
    pub fn apply_add(&mut self, k: f64) -> &mut Self {
        self.apply(|v| v + k)
    }

    /// `v - k`
    pub fn apply_sub(&mut self, k: f64) -> &mut Self {
        self.apply(|v| v - k)
    }

    /// `v * k`
    pub fn apply_mul(&mut self, k: f64) -> &mut Self {
        self.apply(|v| v * k)
    }

    /// `v / k`
    pub fn apply_div(&mut self, k: f64) -> &mut Self {
        self.apply(|v| v / k)
    }

    /// `v ^ p`
    pub fn apply_pow(&mut self, p: f64) -> &mut Self {
        self.apply(|v| v.powf(p))
    }

    /// `1 / v`
    pub fn apply_inv(&mut self) -> &mut Self {
        self.apply(|v| 1.0 / v)
    }

    /// `sqrt(v)`
    pub fn apply_sqrt(&mut self) -> &mut Self {
        self.apply(f64::sqrt)
    }

    // ========================================================================
    // Pairwise transforms
    // ========================================================================

    fn check_same_dims(&self, other: &Hypercube) -> Result<Vec<String>> {
        if self.dim_labels() != other.dim_labels() {
            return Err(HypercubeError::DimensionMismatch {
                left: self.sorted_labels().join(", "),
                right: other.sorted_labels().join(", "),
            }
            .into());
        }
        Ok(self.sorted_labels())
    }

    fn matching_value(index: &StatsIndex, stat: &Stat, labels: &[String]) -> f64 {
        match index.lookup_stat(stat, labels) {
            Ok(Some(found)) => found.value(),
            Ok(None) => f64::NAN,
            Err(e) => {
                warn!(stat = %stat, error = %e, "No single match in right-hand cube");
                f64::NAN
            }
        }
    }

    /// Replace every value `a` by `f(a, b)`, `b` being the value of `other`
    /// at the same coordinates
    ///
    /// Stats whose value is NaN are left untouched.
    pub fn apply_with<F>(&mut self, other: &Hypercube, f: F) -> Result<&mut Self>
    where
        F: Fn(f64, f64) -> f64,
    {
        let labels = self.check_same_dims(other)?;
        let index = StatsIndex::build(other, &labels);

        for stat in self.iter() {
            let (left, right) = {
                let s = stat.read();
                if s.value.is_nan() {
                    continue;
                }
                (s.value, Self::matching_value(&index, &s, &labels))
            };
            stat.set_value(f(left, right));
        }
        Ok(self)
    }

    /// `a + b`
    pub fn apply_add_cube(&mut self, other: &Hypercube) -> Result<&mut Self> {
        self.apply_with(other, |a, b| a + b)
    }

    /// `a - b`
    pub fn apply_sub_cube(&mut self, other: &Hypercube) -> Result<&mut Self> {
        self.apply_with(other, |a, b| a - b)
    }

    /// `a * b`
    pub fn apply_mul_cube(&mut self, other: &Hypercube) -> Result<&mut Self> {
        self.apply_with(other, |a, b| a * b)
    }

    /// `a / b`
    pub fn apply_div_cube(&mut self, other: &Hypercube) -> Result<&mut Self> {
        self.apply_with(other, |a, b| a / b)
    }

    // ========================================================================
    // Computed copies
    // ========================================================================

    fn computed_stat(&self, source: &Stat, value: f64) -> Stat {
        let labels: Vec<&str> = self.dim_labels().iter().map(String::as_str).collect();
        source.project(&labels, value)
    }

    /// New cube of `f(v)` for every defined value
    ///
    /// New stats keep the coordinates on the cube labels and no flags; NaN
    /// results are skipped.
    pub fn computed<F>(&self, f: F) -> Hypercube
    where
        F: Fn(f64) -> f64,
    {
        let mut out = Hypercube::new(self.dim_labels().iter().cloned());
        for stat in self.iter() {
            let s = stat.read();
            if s.value.is_nan() {
                continue;
            }
            let value = f(s.value);
            if value.is_nan() {
                continue;
            }
            out.add(self.computed_stat(&s, value));
        }
        out
    }

    /// New cube of `f(a, b)` for every pair of defined values at the same
    /// coordinates
    pub fn computed_with<F>(&self, other: &Hypercube, f: F) -> Result<Hypercube>
    where
        F: Fn(f64, f64) -> f64,
    {
        let labels = self.check_same_dims(other)?;
        let index = StatsIndex::build(other, &labels);

        let mut out = Hypercube::new(labels.iter().cloned());
        for stat in self.iter() {
            let s = stat.read();
            if s.value.is_nan() {
                continue;
            }
            let right = Self::matching_value(&index, &s, &labels);
            if right.is_nan() {
                continue;
            }
            let value = f(s.value, right);
            if value.is_nan() {
                continue;
            }
            out.add(self.computed_stat(&s, value));
        }
        Ok(out)
    }

    /// Difference `other - self` at each position
    ///
    /// With `ratio` the difference is scaled by `100 / self`, then with `abs`
    /// its absolute value is taken.
    pub fn compute_difference(&self, other: &Hypercube, abs: bool, ratio: bool) -> Result<Hypercube> {
        self.computed_with(other, |a, b| {
            let mut diff = b - a;
            if ratio {
                diff = diff * 100.0 / a;
            }
            if abs {
                diff = diff.abs();
            }
            diff
        })
    }

    /// Stats present in both cubes, by identity
    pub fn intersection(&self, other: &Hypercube) -> Hypercube {
        let common: HashSet<&StatRef> = other.iter().collect();
        Hypercube::from_refs(
            self.dim_labels().iter().cloned(),
            self.iter().filter(|s| common.contains(s)).cloned(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    fn cube(values: &[(&str, &str, f64)]) -> Hypercube {
        let mut hc = Hypercube::new(["geo", "time"]);
        for (geo, time, v) in values {
            hc.add(Stat::with_dims(*v, &[("geo", geo), ("time", time)]));
        }
        hc
    }

    fn sample() -> Hypercube {
        cube(&[
            ("FR", "2020", 1.0),
            ("FR", "2021", 2.0),
            ("IT", "2020", 4.0),
            ("IT", "2021", f64::NAN),
        ])
    }

    #[test]
    fn test_delete_dim() {
        let mut hc = sample();
        hc.delete_dim("geo").unwrap();
        assert!(!hc.has_dim("geo"));
        assert!(hc.stats().iter().all(|s| s.dim("geo").is_none()));
    }

    #[test]
    fn test_delete_dim_reports_missing() {
        let mut hc = sample();
        hc.add(Stat::with_dims(9.0, &[("time", "2022")]));
        let result = hc.delete_dim("geo").map(|_| ());
        assert!(matches!(
            result,
            Err(Error::Hypercube(HypercubeError::MissingCoordinate { missing: 1, .. }))
        ));
        assert!(!hc.has_dim("geo"));
        assert!(hc.stats().iter().all(|s| s.dim("geo").is_none()));
    }

    #[test]
    fn test_delete_dim_value() {
        let mut hc = sample();
        hc.delete_dim_value("geo", "IT");
        assert_eq!(hc.len(), 2);
        assert_eq!(hc.dim_values("geo").len(), 1);
    }

    #[test]
    fn test_delete_dim_values_with_length() {
        let mut hc = sample();
        hc.add(Stat::with_dims(3.0, &[("geo", "EU27"), ("time", "2020")]));
        hc.delete_dim_values_with_length("geo", 4);
        assert_eq!(hc.len(), 4);
        hc.delete_dim_values_with_length("geo", 2);
        assert!(hc.is_empty());
    }

    #[test]
    fn test_shrink() {
        let mut hc = sample().select_dim_equal(&[("geo", "FR")]);
        hc.shrink();
        assert_eq!(hc.sorted_labels(), vec!["time"]);
        assert!(hc.stats().iter().all(|s| s.dim("geo").is_none()));
    }

    #[test]
    fn test_rename_dim() {
        let mut hc = sample();
        hc.rename_dim("geo", "country").unwrap();
        assert!(hc.has_dim("country"));
        assert_eq!(hc.stats()[0].dim("country").as_deref(), Some("FR"));

        assert!(matches!(
            hc.rename_dim("geo", "x").map(|_| ()),
            Err(Error::Hypercube(HypercubeError::UnknownDimension(_)))
        ));
        assert!(matches!(
            hc.rename_dim("country", "time").map(|_| ()),
            Err(Error::Hypercube(HypercubeError::DimensionExists(_)))
        ));
    }

    #[test]
    fn test_replace_dim_value() {
        let mut hc = sample();
        hc.replace_dim_value("geo", "IT", "ITA");
        assert_eq!(
            hc.dim_values("geo").into_iter().collect::<Vec<_>>(),
            vec!["FR", "ITA"]
        );
    }

    #[test]
    fn test_elementwise_chain() {
        let mut hc = sample();
        hc.apply_mul(2.0).apply_add(1.0).apply_negate();
        let values: Vec<f64> = hc.stats().iter().map(StatRef::value).collect();
        assert_eq!(&values[..3], &[-3.0, -5.0, -9.0]);
        assert!(values[3].is_nan());

        hc.apply_abs().apply_sub(1.0).apply_div(2.0).apply_pow(2.0).apply_sqrt().apply_inv();
        assert_eq!(hc.stats()[0].value(), 1.0);
    }

    #[test]
    fn test_apply_cube() {
        let mut left = sample();
        let right = cube(&[("FR", "2020", 10.0), ("IT", "2020", 20.0), ("IT", "2021", 1.0)]);
        left.apply_add_cube(&right).unwrap();

        let values: Vec<f64> = left.stats().iter().map(StatRef::value).collect();
        assert_eq!(values[0], 11.0);
        // no right value
        assert!(values[1].is_nan());
        assert_eq!(values[2], 24.0);
        // left NaN left untouched
        assert!(values[3].is_nan());
    }

    #[test]
    fn test_apply_cube_ambiguous_right() {
        let mut left = cube(&[("FR", "2020", 1.0)]);
        let right = cube(&[("FR", "2020", 2.0), ("FR", "2020", 3.0)]);
        left.apply_mul_cube(&right).unwrap();
        assert!(left.stats()[0].value().is_nan());
    }

    #[test]
    fn test_apply_cube_dimension_mismatch() {
        let mut left = sample();
        let right = Hypercube::new(["geo"]);
        assert!(matches!(
            left.apply_sub_cube(&right).map(|_| ()),
            Err(Error::Hypercube(HypercubeError::DimensionMismatch { .. }))
        ));
    }

    #[test]
    fn test_apply_cube_with_itself() {
        let mut hc = sample();
        let view = hc.clone();
        hc.apply_div_cube(&view).unwrap();
        assert_eq!(hc.stats()[2].value(), 1.0);
    }

    #[test]
    fn test_computed() {
        let hc = sample();
        let mut flagged = hc.stats()[0].write();
        flagged.add_flag(crate::types::Flag::Estimated);
        flagged.set_dim("extra", "x");
        drop(flagged);

        let sqrt = hc.computed(|v| if v < 3.0 { v.sqrt() } else { f64::NAN });
        assert_eq!(sqrt.len(), 2);
        let first = sqrt.stats()[0].snapshot();
        assert!(first.flags.is_empty());
        assert_eq!(first.get_dim("extra"), None);
        assert_eq!(hc.stats()[0].value(), 1.0);
    }

    #[test]
    fn test_compute_difference() {
        let before = cube(&[("FR", "2020", 50.0), ("IT", "2020", 10.0), ("DE", "2020", 5.0)]);
        let after = cube(&[("FR", "2020", 40.0), ("IT", "2020", 15.0)]);

        let diff = before.compute_difference(&after, false, false).unwrap();
        assert_eq!(diff.len(), 2);
        let index = StatsIndex::build(&diff, &["geo", "time"]);
        assert_eq!(index.single_value(&["FR", "2020"]), -10.0);

        let ratio = before.compute_difference(&after, true, true).unwrap();
        let index = StatsIndex::build(&ratio, &["geo", "time"]);
        assert_eq!(index.single_value(&["FR", "2020"]), 20.0);
        assert_eq!(index.single_value(&["IT", "2020"]), 50.0);
    }

    #[test]
    fn test_intersection() {
        let hc = sample();
        let fr = hc.select_dim_equal(&[("geo", "FR")]);
        let y2020 = hc.select_dim_equal(&[("time", "2020")]);
        let both = fr.intersection(&y2020);
        assert_eq!(both.len(), 1);
        assert_eq!(both.stats()[0].value(), 1.0);
    }
}
