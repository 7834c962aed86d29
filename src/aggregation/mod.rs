//! Dimension-wise aggregation of hypercubes
//!
//! Aggregating a hypercube along a target dimension merges every group of
//! stats that share all other coordinates into one new stat, whose target
//! coordinate is set to a caller supplied value (e.g. `EU27` when summing
//! over countries).
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────┐
//! │            Hypercube                │
//! │   stats + dimension labels          │
//! └─────────────────────────────────────┘
//!                  ↓  index on every label but the target
//! ┌─────────────────────────────────────┐
//! │            StatsIndex               │
//! │   one terminal per group            │
//! └─────────────────────────────────────┘
//!                  ↓  Reducer over the defined values
//! ┌─────────────────────────────────────┐
//! │        Aggregated stats             │
//! │   target = new value                │
//! └─────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```rust
//! use statcube::aggregation::{aggregate_into, Reducer};
//! use statcube::hypercube::Hypercube;
//! use statcube::types::Stat;
//!
//! let mut hc = Hypercube::new(["geo", "time"]);
//! hc.add(Stat::with_dims(1.0, &[("geo", "FR"), ("time", "2020")]));
//! hc.add(Stat::with_dims(2.0, &[("geo", "IT"), ("time", "2020")]));
//!
//! let eu = aggregate_into(&hc, "geo", "EU", &Reducer::Sum).unwrap();
//! assert_eq!(eu.len(), 1);
//! assert_eq!(eu.stats()[0].value(), 3.0);
//! ```

pub mod functions;

pub use functions::{
    max, mean, min, percentile, quantiles, rms, sample_std_dev, std_dev, sum, ReduceFn, Reducer,
    ValueSummary,
};

use tracing::debug;

use crate::error::{AggregationError, Result};
use crate::hypercube::Hypercube;
use crate::index::StatsIndex;
use crate::types::Stat;

/// Aggregate the stats of a hypercube along a dimension
///
/// Returns one new stat per group of stats sharing all coordinates but the
/// target one. The new stat copies the coordinates of a group member, with
/// `target` set to `new_value`. NaN values are dropped before reducing; a
/// group holding only NaN values gives NaN (0 for [`Reducer::Count`]).
pub fn aggregate(
    hc: &Hypercube,
    target: &str,
    new_value: &str,
    reducer: &Reducer,
) -> Result<Vec<Stat>> {
    if !hc.has_dim(target) {
        return Err(AggregationError::UnknownDimension(target.to_string()).into());
    }
    reducer.validate()?;

    let labels: Vec<&str> = hc
        .dim_labels()
        .iter()
        .map(String::as_str)
        .filter(|l| *l != target)
        .collect();
    let index = StatsIndex::build(hc, &labels);

    let mut out = Vec::new();
    for group in index.leaves() {
        let Some(first) = group.first() else {
            continue;
        };
        let mut stat = Stat::new(f64::NAN);
        stat.dims = first.read().dims.clone();
        stat.set_dim(target, new_value);

        let values: Vec<f64> = group
            .iter()
            .map(|s| s.value())
            .filter(|v| !v.is_nan())
            .collect();
        // a group of missing values stays missing, only Count reports it
        stat.value = match reducer {
            Reducer::Count => reducer.reduce(&values),
            _ if values.is_empty() => f64::NAN,
            _ => reducer.reduce(&values),
        };
        out.push(stat);
    }

    debug!(
        dimension = target,
        reducer = ?reducer,
        input = hc.len(),
        output = out.len(),
        "Aggregated hypercube"
    );
    Ok(out)
}

/// Aggregate into a new hypercube with the same dimension labels
pub fn aggregate_into(
    hc: &Hypercube,
    target: &str,
    new_value: &str,
    reducer: &Reducer,
) -> Result<Hypercube> {
    let stats = aggregate(hc, target, new_value, reducer)?;
    Ok(Hypercube::from_stats(hc.dim_labels().iter().cloned(), stats))
}

impl Hypercube {
    /// Aggregate along a dimension, see [`aggregate_into`]
    pub fn aggregated(&self, target: &str, new_value: &str, reducer: &Reducer) -> Result<Hypercube> {
        aggregate_into(self, target, new_value, reducer)
    }
}
