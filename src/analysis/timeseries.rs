//! Time series analysis: smoothing, outliers and gaps
//!
//! A time series is a [`StatsIndex`] built on a single time label. Its keys are
//! period codes interpreted by a [`PeriodCalendar`], so windows and gaps are
//! computed in calendar steps rather than on positions in the key list.
//!
//! # Outlier Detection
//!
//! ```text
//! raw ──► moving average (half window w) ──► trend
//! raw - trend ──────────────────────────────► residual
//! moving std of residual (half window d) ───► dispersion
//! ```
//!
//! A period is an outlier when its residual exceeds `diff_th`, the local
//! dispersion exceeds `diff_th / th_nb_std`, and the residual is more than
//! `th_nb_std` dispersions away from the trend.

use std::cmp::Ordering;
use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::aggregation::functions::{mean, sample_std_dev};
use crate::config::OutlierConfig;
use crate::error::Result;
use crate::hypercube::Hypercube;
use crate::index::StatsIndex;
use crate::period::{Period, PeriodCalendar};
use crate::types::Stat;

// ============================================================================
// Period axis
// ============================================================================

/// Series keys parsed and sorted in calendar order
struct TimeAxis<'a> {
    index: &'a StatsIndex,
    label: Option<String>,
    periods: Vec<(Period, String)>,
    keys: HashMap<Period, String>,
}

impl<'a> TimeAxis<'a> {
    fn new<C: PeriodCalendar + ?Sized>(index: &'a StatsIndex, cal: &C) -> Result<Self> {
        let codes = index.keys_at::<&str>(&[]).unwrap_or_default();
        let mut periods = Vec::with_capacity(codes.len());
        for code in codes {
            periods.push((cal.parse(&code)?, code));
        }

        let mut failure = None;
        periods.sort_by(|a, b| {
            cal.compare(&a.0, &b.0).unwrap_or_else(|e| {
                failure.get_or_insert(e);
                Ordering::Equal
            })
        });
        if let Some(e) = failure {
            return Err(e.into());
        }

        let keys = periods.iter().cloned().collect();
        Ok(Self {
            index,
            label: index.label().map(str::to_string),
            periods,
            keys,
        })
    }

    fn value(&self, period: &Period) -> f64 {
        self.keys
            .get(period)
            .map(|key| self.index.single_value(&[key]))
            .unwrap_or(f64::NAN)
    }

    /// Defined values in `[t - w, t + w]`; `None` if one is missing and all
    /// should be there
    fn window<C: PeriodCalendar + ?Sized>(
        &self,
        center: &Period,
        half_window: usize,
        all_should_be_there: bool,
        cal: &C,
    ) -> Option<Vec<f64>> {
        let w = half_window as i64;
        let mut values = Vec::with_capacity(2 * half_window + 1);
        for offset in -w..=w {
            let v = self.value(&cal.successor(center, offset));
            if v.is_nan() {
                if all_should_be_there {
                    return None;
                }
                continue;
            }
            values.push(v);
        }
        Some(values)
    }

    fn derived<F>(&self, mut f: F) -> StatsIndex
    where
        F: FnMut(&Period, &str) -> f64,
    {
        let Some(label) = &self.label else {
            return StatsIndex::Empty;
        };
        let mut hc = Hypercube::new([label.as_str()]);
        for (period, key) in &self.periods {
            hc.add(Stat::new(f(period, key)).dim(label.as_str(), key.as_str()));
        }
        StatsIndex::build(&hc, &[label])
    }
}

// ============================================================================
// Windows
// ============================================================================

/// Period codes of a series in calendar order
pub fn time_list<C: PeriodCalendar + ?Sized>(series: &StatsIndex, cal: &C) -> Result<Vec<String>> {
    let axis = TimeAxis::new(series, cal)?;
    Ok(axis.periods.into_iter().map(|(_, key)| key).collect())
}

/// Mean of the values in `[period - w, period + w]`
///
/// Missing periods are skipped, or make the result NaN when
/// `all_should_be_there` is set. NaN when the window holds no value.
pub fn window_average<C: PeriodCalendar + ?Sized>(
    series: &StatsIndex,
    period: &str,
    half_window: usize,
    all_should_be_there: bool,
    cal: &C,
) -> Result<f64> {
    let axis = TimeAxis::new(series, cal)?;
    let center = cal.parse(period)?;
    Ok(axis
        .window(&center, half_window, all_should_be_there, cal)
        .map_or(f64::NAN, |v| mean(&v)))
}

/// Sample standard deviation of the values in `[period - w, period + w]`
///
/// Same missing value policy as [`window_average`]; 0 for a single value.
pub fn window_std<C: PeriodCalendar + ?Sized>(
    series: &StatsIndex,
    period: &str,
    half_window: usize,
    all_should_be_there: bool,
    cal: &C,
) -> Result<f64> {
    let axis = TimeAxis::new(series, cal)?;
    let center = cal.parse(period)?;
    Ok(axis
        .window(&center, half_window, all_should_be_there, cal)
        .map_or(f64::NAN, |v| sample_std_dev(&v)))
}

/// Centered moving average over every period of the series
pub fn moving_average<C: PeriodCalendar + ?Sized>(
    series: &StatsIndex,
    half_window: usize,
    all_should_be_there: bool,
    cal: &C,
) -> Result<StatsIndex> {
    let axis = TimeAxis::new(series, cal)?;
    Ok(axis.derived(|period, _| {
        axis.window(period, half_window, all_should_be_there, cal)
            .map_or(f64::NAN, |v| mean(&v))
    }))
}

/// Centered moving sample standard deviation over every period of the series
pub fn moving_std<C: PeriodCalendar + ?Sized>(
    series: &StatsIndex,
    half_window: usize,
    all_should_be_there: bool,
    cal: &C,
) -> Result<StatsIndex> {
    let axis = TimeAxis::new(series, cal)?;
    Ok(axis.derived(|period, _| {
        axis.window(period, half_window, all_should_be_there, cal)
            .map_or(f64::NAN, |v| sample_std_dev(&v))
    }))
}

/// `a - b` over the periods of `a`; NaN where `b` has no value
pub fn difference(a: &StatsIndex, b: &StatsIndex) -> StatsIndex {
    let Some(label) = a.label() else {
        return StatsIndex::Empty;
    };
    let mut hc = Hypercube::new([label]);
    for key in a.keys_at::<&str>(&[]).unwrap_or_default() {
        let value = a.single_value(&[&key]) - b.single_value(&[&key]);
        hc.add(Stat::new(value).dim(label, key));
    }
    StatsIndex::build(&hc, &[label])
}

// ============================================================================
// Outliers
// ============================================================================

/// A value far from the local trend of its series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Outlier {
    /// Series identifier
    pub label: String,
    /// Period code
    pub period: String,
    /// Raw value minus trend
    pub residual: f64,
    /// Local dispersion of the residuals
    pub std: f64,
    /// `residual / std`
    pub gravity: f64,
}

/// Detect outliers of a time series
///
/// `label` identifies the series in the report. Results are sorted by
/// decreasing absolute gravity.
pub fn detect_outliers<C: PeriodCalendar + ?Sized>(
    series: &StatsIndex,
    label: &str,
    config: &OutlierConfig,
    cal: &C,
) -> Result<Vec<Outlier>> {
    let all = config.all_should_be_there;
    let trend = moving_average(series, config.half_window, all, cal)?;
    let residuals = difference(series, &trend);
    let dispersion = moving_std(&residuals, config.dispersion_half_window(), all, cal)?;

    let mut outliers = Vec::new();
    for key in time_list(series, cal)? {
        let residual = residuals.single_value(&[&key]);
        let std = dispersion.single_value(&[&key]);

        let tested = if config.two_sided { residual.abs() } else { residual };
        if !(tested > config.diff_th) {
            continue;
        }
        if !(std > config.diff_th / config.th_nb_std) {
            continue;
        }
        if !(residual.abs() / std > config.th_nb_std) {
            continue;
        }

        outliers.push(Outlier {
            label: label.to_string(),
            period: key,
            residual,
            std,
            gravity: residual / std,
        });
    }

    outliers.sort_by(|a, b| {
        b.gravity
            .abs()
            .partial_cmp(&a.gravity.abs())
            .unwrap_or(Ordering::Equal)
    });
    debug!(series = label, outliers = outliers.len(), "Outlier detection done");
    Ok(outliers)
}

// ============================================================================
// Gaps
// ============================================================================

/// Missing stretch between two consecutive periods of a series
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Gap {
    /// Series identifier
    pub label: String,
    /// Last period before the gap
    pub from: String,
    /// First period after the gap
    pub to: String,
    /// Calendar steps from `from` to `to`
    pub duration: i64,
}

/// Gaps of a time series, longest first
pub fn gap_analysis<C: PeriodCalendar + ?Sized>(
    series: &StatsIndex,
    label: &str,
    cal: &C,
) -> Result<Vec<Gap>> {
    let axis = TimeAxis::new(series, cal)?;

    let mut gaps = Vec::new();
    for pair in axis.periods.windows(2) {
        let (prev, prev_key) = &pair[0];
        let (next, next_key) = &pair[1];
        if cal.successor(prev, 1) == *next {
            continue;
        }
        gaps.push(Gap {
            label: label.to_string(),
            from: prev_key.clone(),
            to: next_key.clone(),
            duration: cal.duration(prev, next)?,
        });
    }

    gaps.sort_by(|a, b| b.duration.cmp(&a.duration));
    Ok(gaps)
}

// ============================================================================
// Monthly series helpers
// ============================================================================

fn months(year: i32) -> impl Iterator<Item = Period> {
    (1..=12).map(move |month| Period::Month { year, month })
}

/// Check that no month of a year has a defined value
pub fn is_year_empty<C: PeriodCalendar + ?Sized>(
    series: &StatsIndex,
    year: i32,
    cal: &C,
) -> Result<bool> {
    let axis = TimeAxis::new(series, cal)?;
    Ok(months(year).all(|m| axis.value(&m).is_nan()))
}

/// Multiply the defined monthly values of a year, in place
///
/// Returns the number of stats changed.
pub fn multiply_year_values<C: PeriodCalendar + ?Sized>(
    series: &StatsIndex,
    year: i32,
    factor: f64,
    cal: &C,
) -> Result<usize> {
    let axis = TimeAxis::new(series, cal)?;
    let mut changed = 0;
    for month in months(year) {
        let Some(key) = axis.keys.get(&month) else {
            continue;
        };
        let Some(stat) = series.lookup(&[key]) else {
            continue;
        };
        let value = stat.value();
        if value.is_nan() {
            continue;
        }
        stat.set_value(value * factor);
        changed += 1;
    }
    Ok(changed)
}
