//! statcube - Sparse multi-dimensional statistical hypercubes
//!
//! This library models a statistical dataset as a set of stats, each with a
//! value, a set of flags and coordinates along named dimensions:
//! - Selection by value, coordinate and composable criteria
//! - Multi-level indexes for fast lookup and grouping
//! - Aggregation along a dimension with pluggable reducers
//! - Compacity, uniqueness and coordinate validity checks
//! - Time series moving statistics, outlier detection and gap analysis
//! - Delimited text import and export

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod types;

/// Hypercube container, selection and structural operations
pub mod hypercube;

/// Multi-level index over stats
pub mod index;

/// Aggregation along a dimension
pub mod aggregation;

/// Compacity, validation and time series analyses
pub mod analysis;

/// Time periods and calendars
pub mod period;

/// Configuration management with TOML support
pub mod config;

/// Delimited text and JSON import/export
pub mod io;

// Re-export main types
pub use aggregation::{aggregate, aggregate_into, Reducer, ValueSummary};
pub use config::{AnalysisConfig, Config, LoaderConfig, OutlierConfig};
pub use error::{Error, Result};
pub use hypercube::{CompareOp, Criteria, Hypercube};
pub use index::StatsIndex;
pub use period::{EurostatCalendar, Period, PeriodCalendar};
pub use types::{Flag, Stat, StatRef};
