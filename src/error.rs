//! Error types for hypercube operations

use thiserror::Error;

/// Main error type for the crate
#[derive(Error, Debug)]
pub enum Error {
    /// Hypercube structure error
    #[error("Hypercube error: {0}")]
    Hypercube(#[from] HypercubeError),

    /// Index error
    #[error("Index error: {0}")]
    Index(#[from] IndexError),

    /// Aggregation error
    #[error("Aggregation error: {0}")]
    Aggregation(#[from] AggregationError),

    /// Time period error
    #[error("Period error: {0}")]
    Period(#[from] PeriodError),

    /// Loader error
    #[error("Load error: {0}")]
    Load(#[from] LoadError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Structural errors on a hypercube
#[derive(Error, Debug, Clone, PartialEq)]
pub enum HypercubeError {
    /// Some stats did not define the coordinate being removed or renamed.
    ///
    /// The operation is still applied to every stat that had it.
    #[error("dimension {label} not defined for {missing} stat(s)")]
    MissingCoordinate {
        /// The dimension label
        label: String,
        /// Number of stats lacking the coordinate
        missing: usize,
    },

    /// Two hypercubes were combined but do not share the same dimensions
    #[error("dimension mismatch: left has [{left}], right has [{right}]")]
    DimensionMismatch {
        /// Labels of the left-hand cube, comma separated
        left: String,
        /// Labels of the right-hand cube, comma separated
        right: String,
    },

    /// The requested dimension label is not part of the hypercube
    #[error("unknown dimension: {0}")]
    UnknownDimension(String),

    /// The operation requires a single-dimension hypercube
    #[error("expected exactly one dimension, found {0}")]
    NotOneDimensional(usize),

    /// Target label already exists
    #[error("dimension already exists: {0}")]
    DimensionExists(String),
}

/// Index lookup errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum IndexError {
    /// A single stat was expected but several share the coordinates
    #[error("ambiguous lookup at [{path}]: {multiplicity} stats share these coordinates")]
    Ambiguous {
        /// Coordinates of the lookup
        path: String,
        /// Number of stats found there
        multiplicity: usize,
    },

    /// More coordinates were given than the index has levels
    #[error("too many coordinates: index depth exceeded at [{0}]")]
    DepthExceeded(String),
}

/// Aggregation errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AggregationError {
    /// The aggregation target is not a dimension of the hypercube
    #[error("unknown aggregation dimension: {0}")]
    UnknownDimension(String),

    /// Percentile outside of (0, 100]
    #[error("invalid percentile: {0}")]
    InvalidPercentile(f64),
}

/// Time period errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PeriodError {
    /// The period code could not be parsed
    #[error("unhandled period format: {0:?}")]
    InvalidFormat(String),

    /// Periods of different granularity were compared
    #[error("incompatible periods: {0} and {1}")]
    Incompatible(String, String),
}

/// Loader errors
#[derive(Error, Debug)]
pub enum LoadError {
    /// Input had no header line
    #[error("missing header line")]
    MissingHeader,

    /// The configured value column is absent from the header
    #[error("value column {0:?} not found in header")]
    MissingValueColumn(String),

    /// The configured field pattern is not a valid regex
    #[error("invalid field pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    /// A data line had fewer fields than the header
    #[error("line {line}: expected {expected} fields, found {found}")]
    FieldCount {
        /// Line number (1-indexed)
        line: usize,
        /// Number of header fields
        expected: usize,
        /// Number of fields found
        found: usize,
    },
}

impl From<toml::de::Error> for Error {
    fn from(e: toml::de::Error) -> Self {
        Error::Configuration(e.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
