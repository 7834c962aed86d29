//! Core data types: statistical observations and their quality flags
//!
//! # Key Types
//!
//! - **`Stat`**: A single observation (value + dimension coordinates + flags)
//! - **`Flag`**: Quality annotation drawn from the closed Eurostat flag table
//! - **`StatRef`**: Shared handle to a `Stat`; identity is the handle, not the content
//!
//! # Example
//!
//! ```rust
//! use statcube::types::{Flag, Stat, StatRef};
//!
//! let mut stat = Stat::with_dims(42.5, &[("country", "IT"), ("time", "2020")]);
//! stat.add_flag(Flag::Provisional);
//! assert_eq!(stat.value_flagged(), "42.5p");
//!
//! let a = StatRef::new(stat.clone());
//! let b = StatRef::new(stat);
//! assert_ne!(a, b); // same content, distinct observations
//! ```

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use serde::{Deserialize, Serialize};
use tracing::warn;

// ============================================================================
// Flags
// ============================================================================

/// Quality flag attached to a statistical value
///
/// Each flag has a one-letter code used in source files (`p` for provisional,
/// `e` for estimated, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Flag {
    /// `b`: break in time series
    #[serde(rename = "b")]
    BreakInSeries,
    /// `c`: confidential
    #[serde(rename = "c")]
    Confidential,
    /// `d`: definition differs, see metadata
    #[serde(rename = "d")]
    DefinitionDiffers,
    /// `e`: estimated
    #[serde(rename = "e")]
    Estimated,
    /// `f`: forecast
    #[serde(rename = "f")]
    Forecast,
    /// `i`: see metadata (phased out)
    #[serde(rename = "i")]
    SeeMetadata,
    /// `n`: not significant
    #[serde(rename = "n")]
    NotSignificant,
    /// `p`: provisional
    #[serde(rename = "p")]
    Provisional,
    /// `r`: revised
    #[serde(rename = "r")]
    Revised,
    /// `s`: Eurostat estimate (phased out)
    #[serde(rename = "s")]
    EurostatEstimate,
    /// `u`: low reliability
    #[serde(rename = "u")]
    LowReliability,
    /// `x`: under embargo
    #[serde(rename = "x")]
    UnderEmbargo,
    /// `z`: not applicable
    #[serde(rename = "z")]
    NotApplicable,
}

impl Flag {
    /// All flags, in code order
    pub const ALL: [Flag; 13] = [
        Flag::BreakInSeries,
        Flag::Confidential,
        Flag::DefinitionDiffers,
        Flag::Estimated,
        Flag::Forecast,
        Flag::SeeMetadata,
        Flag::NotSignificant,
        Flag::Provisional,
        Flag::Revised,
        Flag::EurostatEstimate,
        Flag::LowReliability,
        Flag::UnderEmbargo,
        Flag::NotApplicable,
    ];

    /// One-letter code of the flag
    pub fn code(self) -> char {
        match self {
            Flag::BreakInSeries => 'b',
            Flag::Confidential => 'c',
            Flag::DefinitionDiffers => 'd',
            Flag::Estimated => 'e',
            Flag::Forecast => 'f',
            Flag::SeeMetadata => 'i',
            Flag::NotSignificant => 'n',
            Flag::Provisional => 'p',
            Flag::Revised => 'r',
            Flag::EurostatEstimate => 's',
            Flag::LowReliability => 'u',
            Flag::UnderEmbargo => 'x',
            Flag::NotApplicable => 'z',
        }
    }

    /// Decode a one-letter flag code
    pub fn from_code(code: char) -> Option<Flag> {
        Flag::ALL.iter().copied().find(|f| f.code() == code)
    }

    /// Human readable description
    pub fn description(self) -> &'static str {
        match self {
            Flag::BreakInSeries => "break in time series",
            Flag::Confidential => "confidential",
            Flag::DefinitionDiffers => "definition differs, see metadata",
            Flag::Estimated => "estimated",
            Flag::Forecast => "forecast",
            Flag::SeeMetadata => "see metadata (phased out)",
            Flag::NotSignificant => "not significant",
            Flag::Provisional => "provisional",
            Flag::Revised => "revised",
            Flag::EurostatEstimate => "Eurostat estimate (phased out)",
            Flag::LowReliability => "low reliability",
            Flag::UnderEmbargo => "under embargo",
            Flag::NotApplicable => "not applicable",
        }
    }
}

impl fmt::Display for Flag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

// ============================================================================
// Stat
// ============================================================================

/// A statistical value located by dimension coordinates
///
/// `value` is NaN when the observation is missing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Stat {
    /// The statistical value
    pub value: f64,

    /// Dimension label -> dimension value (e.g. gender -> male)
    pub dims: HashMap<String, String>,

    /// Quality flags
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub flags: BTreeSet<Flag>,
}

impl Stat {
    /// Create a stat without coordinates
    pub fn new(value: f64) -> Self {
        Self {
            value,
            dims: HashMap::new(),
            flags: BTreeSet::new(),
        }
    }

    /// Create a stat from a value and `(label, value)` coordinate pairs
    pub fn with_dims(value: f64, dims: &[(&str, &str)]) -> Self {
        let mut stat = Self::new(value);
        for (label, dim_value) in dims {
            stat.dims.insert((*label).to_string(), (*dim_value).to_string());
        }
        stat
    }

    /// Builder-style coordinate setter
    pub fn dim(mut self, label: impl Into<String>, value: impl Into<String>) -> Self {
        self.dims.insert(label.into(), value.into());
        self
    }

    /// Coordinate for a dimension label
    pub fn get_dim(&self, label: &str) -> Option<&str> {
        self.dims.get(label).map(String::as_str)
    }

    /// Set a coordinate, returning the previous value
    pub fn set_dim(&mut self, label: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.dims.insert(label.into(), value.into())
    }

    /// Remove a coordinate, returning it if it was defined
    pub fn remove_dim(&mut self, label: &str) -> Option<String> {
        self.dims.remove(label)
    }

    /// Coordinates projected on an ordered list of labels
    pub fn dim_values<S: AsRef<str>>(&self, labels: &[S]) -> Vec<Option<String>> {
        labels
            .iter()
            .map(|l| self.dims.get(l.as_ref()).cloned())
            .collect()
    }

    /// Add a flag, returning false if it was already present
    pub fn add_flag(&mut self, flag: Flag) -> bool {
        self.flags.insert(flag)
    }

    /// Remove a flag, returning false if it was absent
    pub fn remove_flag(&mut self, flag: Flag) -> bool {
        self.flags.remove(&flag)
    }

    /// Check if the stat carries a flag
    pub fn is_flagged(&self, flag: Flag) -> bool {
        self.flags.contains(&flag)
    }

    /// Add every flag of a code string such as `"ep"`
    ///
    /// Unknown codes are logged and skipped; they are returned to the caller.
    pub fn add_flags_from_codes(&mut self, codes: &str) -> Vec<char> {
        let mut unknown = Vec::new();
        for c in codes.chars().filter(|c| !c.is_whitespace()) {
            match Flag::from_code(c) {
                Some(flag) => {
                    self.flags.insert(flag);
                }
                None => {
                    warn!(code = %c, stat = %self, "Unexpected flag");
                    unknown.push(c);
                }
            }
        }
        unknown
    }

    /// Flag codes as a string, in code order
    pub fn flags_string(&self) -> String {
        self.flags.iter().map(|f| f.code()).collect()
    }

    /// Value followed by its flag codes (e.g. `12.5ep`)
    pub fn value_flagged(&self) -> String {
        format!("{}{}", self.value, self.flags_string())
    }

    /// Copy of the value and the coordinates restricted to `labels`, without flags
    pub fn project<S: AsRef<str>>(&self, labels: &[S], value: f64) -> Stat {
        let mut out = Stat::new(value);
        for label in labels {
            if let Some(v) = self.dims.get(label.as_ref()) {
                out.dims.insert(label.as_ref().to_string(), v.clone());
            }
        }
        out
    }
}

impl fmt::Display for Stat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut dims: Vec<_> = self.dims.iter().collect();
        dims.sort();
        for (label, value) in dims {
            write!(f, "{}:{}, ", label, value)?;
        }
        write!(f, "{}", self.value_flagged())
    }
}

// ============================================================================
// Shared handle
// ============================================================================

/// Shared handle to a [`Stat`]
///
/// Hypercubes, their selections and the indexes built over them hold handles
/// to the same stats: mutating through one view is visible through all of
/// them. Equality and hashing use the handle identity, so two stats with the
/// same content are still distinct members of a hypercube.
#[derive(Clone)]
pub struct StatRef(Arc<RwLock<Stat>>);

impl StatRef {
    /// Wrap a new stat
    pub fn new(stat: Stat) -> Self {
        Self(Arc::new(RwLock::new(stat)))
    }

    /// Read access to the stat
    pub fn read(&self) -> RwLockReadGuard<'_, Stat> {
        self.0.read()
    }

    /// Write access to the stat
    pub fn write(&self) -> RwLockWriteGuard<'_, Stat> {
        self.0.write()
    }

    /// Current value
    pub fn value(&self) -> f64 {
        self.0.read().value
    }

    /// Replace the value
    pub fn set_value(&self, value: f64) {
        self.0.write().value = value;
    }

    /// Owned copy of a coordinate
    pub fn dim(&self, label: &str) -> Option<String> {
        self.0.read().dims.get(label).cloned()
    }

    /// Owned copy of the stat content
    pub fn snapshot(&self) -> Stat {
        self.0.read().clone()
    }

    /// Check if two handles point to the same stat
    pub fn ptr_eq(&self, other: &StatRef) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl From<Stat> for StatRef {
    fn from(stat: Stat) -> Self {
        StatRef::new(stat)
    }
}

impl PartialEq for StatRef {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for StatRef {}

impl Hash for StatRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::ptr::hash(Arc::as_ptr(&self.0), state);
    }
}

impl fmt::Debug for StatRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("StatRef").field(&*self.0.read()).finish()
    }
}

impl fmt::Display for StatRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", *self.0.read())
    }
}
