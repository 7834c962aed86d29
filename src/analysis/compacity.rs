//! Compacity: how full a hypercube is
//!
//! The theoretical size of a hypercube is the product of the cardinalities of
//! its dimensions. Compacity is the ratio between the actual number of stats
//! and that size: 1 for a dense cube, below 1 for a sparse one, above 1 when
//! several stats share the same coordinates.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::config::AnalysisConfig;
use crate::error::{HypercubeError, Result};
use crate::hypercube::{CompareOp, Criteria, Hypercube};

/// Sort direction for ranked results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    /// Largest first
    #[default]
    Descending,
    /// Smallest first
    Ascending,
}

/// Number of positions of the hypercube: product of the dimension cardinalities
///
/// 0 for a cube without dimensions.
pub fn max_theoretical_size(hc: &Hypercube) -> usize {
    if hc.dim_labels().is_empty() {
        return 0;
    }
    hc.dim_labels()
        .iter()
        .map(|l| hc.dim_cardinality(l))
        .fold(1usize, usize::saturating_mul)
}

/// Number of stats over the theoretical size, 0 when that size is 0
pub fn compacity(hc: &Hypercube) -> f64 {
    let max = max_theoretical_size(hc);
    if max == 0 {
        return 0.0;
    }
    hc.len() as f64 / max as f64
}

/// Compacity of the stats remaining once NaN and/or zero values are left out
///
/// The theoretical size is recomputed on the remaining stats.
pub fn compacity_filtered(hc: &Hypercube, ignore_nan: bool, ignore_zero: bool) -> f64 {
    let mut filters = Vec::new();
    if ignore_nan {
        filters.push(Criteria::ValueDefined);
    }
    if ignore_zero {
        filters.push(Criteria::value(CompareOp::Ne, 0.0));
    }
    if filters.is_empty() {
        return compacity(hc);
    }
    compacity(&hc.select(&Criteria::and(filters)))
}

/// Compacity with the filters of an analysis configuration
pub fn compacity_with(hc: &Hypercube, config: &AnalysisConfig) -> f64 {
    compacity_filtered(hc, config.compacity_ignore_nan, config.compacity_ignore_zero)
}

/// Compacity of each slice `label = value`, sorted by ratio
///
/// Slices with the same ratio keep the order in which their value first
/// appears in the cube.
pub fn compacity_per_dimension_value(
    hc: &Hypercube,
    label: &str,
    order: SortOrder,
) -> Result<Vec<(String, f64)>> {
    if !hc.has_dim(label) {
        return Err(HypercubeError::UnknownDimension(label.to_string()).into());
    }

    let mut ratios: Vec<(String, f64)> = hc
        .dim_values_ordered(label)
        .into_iter()
        .map(|value| {
            let slice = hc.select_dim_equal(&[(label, value.as_str())]);
            let ratio = compacity(&slice);
            (value, ratio)
        })
        .collect();

    ratios.sort_by(|a, b| {
        let ord = a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal);
        match order {
            SortOrder::Ascending => ord,
            SortOrder::Descending => ord.reverse(),
        }
    });
    Ok(ratios)
}
