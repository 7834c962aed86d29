//! Reducers and descriptive statistics over value sets
//!
//! This module provides the numeric building blocks of the aggregation
//! engine:
//!
//! - Reducers (sum, min, max, mean, percentile, standard deviation, RMS, count)
//! - Percentiles with linear interpolation between closest ranks
//! - Quantiles and a five-number summary ([`ValueSummary`])
//!
//! # NaN Handling
//!
//! Callers drop NaN inputs before reducing. Over an empty input, `sum` and
//! `count` return 0 and every other reducer returns NaN.
//!
//! # Example
//!
//! ```rust
//! use statcube::aggregation::functions::{percentile, Reducer};
//!
//! let values = [1.0, 2.0, 3.0, 4.0];
//! assert_eq!(Reducer::Sum.reduce(&values), 10.0);
//! assert_eq!(percentile(&values, 50.0), 2.5);
//! ```

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::error::AggregationError;

// ============================================================================
// Reducers
// ============================================================================

/// User supplied reducer
pub type ReduceFn = Arc<dyn Fn(&[f64]) -> f64 + Send + Sync>;

/// Function turning a group of values into one
#[derive(Clone)]
pub enum Reducer {
    /// Sum (0 for an empty group)
    Sum,
    /// Minimum
    Min,
    /// Maximum
    Max,
    /// Arithmetic mean
    Mean,
    /// Percentile in (0, 100]
    Percentile(f64),
    /// Population standard deviation
    StdDev,
    /// Root mean square
    Rms,
    /// Number of values (0 for an empty group)
    Count,
    /// Arbitrary function
    Custom(ReduceFn),
}

impl Reducer {
    /// Wrap a closure
    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(&[f64]) -> f64 + Send + Sync + 'static,
    {
        Reducer::Custom(Arc::new(f))
    }

    /// Median
    pub fn median() -> Self {
        Reducer::Percentile(50.0)
    }

    /// Check the reducer parameters
    pub fn validate(&self) -> Result<(), AggregationError> {
        match self {
            Reducer::Percentile(p) if !(*p > 0.0 && *p <= 100.0) => {
                Err(AggregationError::InvalidPercentile(*p))
            }
            _ => Ok(()),
        }
    }

    /// Reduce a group of defined values
    pub fn reduce(&self, values: &[f64]) -> f64 {
        match self {
            Reducer::Sum => sum(values),
            Reducer::Min => min(values),
            Reducer::Max => max(values),
            Reducer::Mean => mean(values),
            Reducer::Percentile(p) => percentile(values, *p),
            Reducer::StdDev => std_dev(values),
            Reducer::Rms => rms(values),
            Reducer::Count => values.len() as f64,
            Reducer::Custom(f) => f(values),
        }
    }
}

impl fmt::Debug for Reducer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reducer::Sum => write!(f, "Sum"),
            Reducer::Min => write!(f, "Min"),
            Reducer::Max => write!(f, "Max"),
            Reducer::Mean => write!(f, "Mean"),
            Reducer::Percentile(p) => write!(f, "Percentile({})", p),
            Reducer::StdDev => write!(f, "StdDev"),
            Reducer::Rms => write!(f, "Rms"),
            Reducer::Count => write!(f, "Count"),
            Reducer::Custom(_) => write!(f, "Custom"),
        }
    }
}

/// Sum of the values, 0 when empty
pub fn sum(values: &[f64]) -> f64 {
    values.iter().fold(0.0, |acc, v| acc + v)
}

/// Smallest value, NaN when empty
pub fn min(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().copied().fold(f64::INFINITY, f64::min)
}

/// Largest value, NaN when empty
pub fn max(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().copied().fold(f64::NEG_INFINITY, f64::max)
}

/// Arithmetic mean, NaN when empty
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    sum(values) / values.len() as f64
}

/// Population standard deviation, NaN when empty
pub fn std_dev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    let m = mean(values);
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    var.sqrt()
}

/// Sample standard deviation (n - 1 denominator)
///
/// 0 for a single value, NaN when empty.
pub fn sample_std_dev(values: &[f64]) -> f64 {
    match values.len() {
        0 => f64::NAN,
        1 => 0.0,
        n => {
            let m = mean(values);
            let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (n - 1) as f64;
            var.sqrt()
        }
    }
}

/// Root mean square, NaN when empty
pub fn rms(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    (values.iter().map(|v| v * v).sum::<f64>() / values.len() as f64).sqrt()
}

fn sorted(values: &[f64]) -> Vec<f64> {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    sorted
}

/// Percentile `p` in (0, 100] with linear interpolation
///
/// The rank is `p * (n + 1) / 100`: below 1 the minimum is returned, at or
/// above `n` the maximum, otherwise the two closest ranks are interpolated.
pub fn percentile(values: &[f64], p: f64) -> f64 {
    percentile_sorted(&sorted(values), p)
}

fn percentile_sorted(sorted: &[f64], p: f64) -> f64 {
    let n = sorted.len();
    if n == 0 || !(p > 0.0 && p <= 100.0) {
        return f64::NAN;
    }
    if n == 1 {
        return sorted[0];
    }

    let pos = p * (n as f64 + 1.0) / 100.0;
    let fpos = pos.floor();
    let dif = pos - fpos;
    if pos < 1.0 {
        return sorted[0];
    }
    if pos >= n as f64 {
        return sorted[n - 1];
    }
    let int_pos = fpos as usize;
    let lower = sorted[int_pos - 1];
    let upper = sorted[int_pos];
    lower + dif * (upper - lower)
}

/// `n` values at percentiles `100 * i / (n + 1)`, for `i` in `1..=n`
pub fn quantiles(values: &[f64], n: usize) -> Vec<f64> {
    let sorted = sorted(values);
    (1..=n)
        .map(|i| percentile_sorted(&sorted, 100.0 * i as f64 / (n + 1) as f64))
        .collect()
}

// ============================================================================
// Summary
// ============================================================================

/// Descriptive statistics over a set of values
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ValueSummary {
    /// Number of values
    pub count: usize,
    /// Smallest value
    pub min: f64,
    /// Largest value
    pub max: f64,
    /// Arithmetic mean
    pub mean: f64,
    /// 50th percentile
    pub median: f64,
    /// 25th percentile
    pub q1: f64,
    /// 75th percentile
    pub q3: f64,
    /// Sample standard deviation
    pub std: f64,
}

impl ValueSummary {
    /// Summarize the values, NaN inputs dropped
    pub fn from_values(values: &[f64]) -> Self {
        let defined: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
        let sorted = sorted(&defined);
        Self {
            count: sorted.len(),
            min: min(&sorted),
            max: max(&sorted),
            mean: mean(&sorted),
            median: percentile_sorted(&sorted, 50.0),
            q1: percentile_sorted(&sorted, 25.0),
            q3: percentile_sorted(&sorted, 75.0),
            std: sample_std_dev(&sorted),
        }
    }
}

impl fmt::Display for ValueSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Count: {}", self.count)?;
        writeln!(f, "Min: {}", self.min)?;
        writeln!(f, "Q1: {}", self.q1)?;
        writeln!(f, "Median: {}", self.median)?;
        writeln!(f, "Q3: {}", self.q3)?;
        writeln!(f, "Max: {}", self.max)?;
        writeln!(f, "Mean: {}", self.mean)?;
        write!(f, "Std: {}", self.std)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reducer_identities() {
        let values = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert_eq!(Reducer::Sum.reduce(&values), 40.0);
        assert_eq!(Reducer::Min.reduce(&values), 2.0);
        assert_eq!(Reducer::Max.reduce(&values), 9.0);
        assert_eq!(Reducer::Mean.reduce(&values), 5.0);
        assert_eq!(Reducer::StdDev.reduce(&values), 2.0);
        assert_eq!(Reducer::Count.reduce(&values), 8.0);
        assert!((Reducer::Rms.reduce(&[3.0, 4.0]) - 12.5f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_constant_group() {
        let values = [2.5; 6];
        assert_eq!(Reducer::Sum.reduce(&values), 15.0);
        assert_eq!(Reducer::Mean.reduce(&values), 2.5);
        assert_eq!(Reducer::StdDev.reduce(&values), 0.0);
        assert_eq!(Reducer::Min.reduce(&values), 2.5);
        assert_eq!(Reducer::Max.reduce(&values), 2.5);
        assert_eq!(Reducer::median().reduce(&values), 2.5);
    }

    #[test]
    fn test_empty_sum_is_positive_zero() {
        assert!(sum(&[]).is_sign_positive());
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(Reducer::Sum.reduce(&[]), 0.0);
        assert_eq!(Reducer::Count.reduce(&[]), 0.0);
        assert!(Reducer::Min.reduce(&[]).is_nan());
        assert!(Reducer::Max.reduce(&[]).is_nan());
        assert!(Reducer::Mean.reduce(&[]).is_nan());
        assert!(Reducer::median().reduce(&[]).is_nan());
        assert!(Reducer::StdDev.reduce(&[]).is_nan());
        assert!(Reducer::Rms.reduce(&[]).is_nan());
    }

    #[test]
    fn test_percentile_interpolation() {
        let values = [4.0, 1.0, 3.0, 2.0];
        assert_eq!(percentile(&values, 50.0), 2.5);
        assert_eq!(percentile(&values, 100.0), 4.0);
        // rank below 1
        assert_eq!(percentile(&values, 10.0), 1.0);
        assert_eq!(percentile(&values, 25.0), 1.25);
        assert_eq!(percentile(&[7.0], 30.0), 7.0);
    }

    #[test]
    fn test_percentile_validation() {
        assert!(Reducer::Percentile(0.0).validate().is_err());
        assert!(Reducer::Percentile(101.0).validate().is_err());
        assert!(Reducer::Percentile(f64::NAN).validate().is_err());
        assert!(Reducer::Percentile(100.0).validate().is_ok());
        assert!(percentile(&[1.0, 2.0], 0.0).is_nan());
    }

    #[test]
    fn test_sample_std() {
        assert_eq!(sample_std_dev(&[5.0]), 0.0);
        assert!(sample_std_dev(&[]).is_nan());
        assert!((sample_std_dev(&[1.0, 2.0, 3.0, 4.0]) - 1.2909944).abs() < 1e-6);
    }

    #[test]
    fn test_quantiles() {
        let values: Vec<f64> = (1..=9).map(f64::from).collect();
        let q = quantiles(&values, 3);
        assert_eq!(q, vec![2.5, 5.0, 7.5]);
        assert!(quantiles(&values, 0).is_empty());
    }

    #[test]
    fn test_summary() {
        let summary = ValueSummary::from_values(&[1.0, f64::NAN, 2.0, 3.0, 4.0]);
        assert_eq!(summary.count, 4);
        assert_eq!(summary.min, 1.0);
        assert_eq!(summary.max, 4.0);
        assert_eq!(summary.median, 2.5);
        assert_eq!(summary.q1, 1.25);
        assert_eq!(summary.q3, 3.75);
        assert!(summary.to_string().starts_with("Count: 4"));
    }

    #[test]
    fn test_custom_reducer() {
        let range = Reducer::custom(|v| max(v) - min(v));
        assert_eq!(range.reduce(&[3.0, 9.0, 4.0]), 6.0);
        assert_eq!(format!("{:?}", range), "Custom");
    }
}
