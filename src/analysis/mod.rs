//! Data quality analyses on hypercubes
//!
//! # Key Components
//!
//! - **Compacity** (`compacity.rs`): how much of the theoretical space is filled
//! - **Validation** (`validation.rs`): duplicate positions and unexpected
//!   dimension values
//! - **Time series** (`timeseries.rs`): moving statistics, outlier detection
//!   and gap analysis

pub mod compacity;
pub mod timeseries;
pub mod validation;

pub use compacity::{
    compacity, compacity_filtered, compacity_per_dimension_value, compacity_with,
    max_theoretical_size, SortOrder,
};
pub use timeseries::{
    detect_outliers, difference, gap_analysis, is_year_empty, moving_average, moving_std,
    multiply_year_values, time_list, window_average, window_std, Gap, Outlier,
};
pub use validation::{check_dimension_values_validity, check_uniqueness};
