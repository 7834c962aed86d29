//! Time period arithmetic
//!
//! Time coordinates are plain strings in hypercubes. A [`PeriodCalendar`]
//! gives them meaning: parsing, ordering, stepping and durations. The
//! [`EurostatCalendar`] handles the Eurostat dissemination codes, yearly
//! (`2020`) and monthly (`2020M01`); surrounding whitespace is ignored.
//!
//! # Example
//!
//! ```rust
//! use statcube::period::{EurostatCalendar, Period, PeriodCalendar};
//!
//! let cal = EurostatCalendar;
//! let p = cal.parse("2020M11").unwrap();
//! assert_eq!(cal.successor(&p, 3), Period::Month { year: 2021, month: 2 });
//! assert_eq!(cal.format(&Period::Year(2019)), "2019");
//! ```

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::PeriodError;

/// A time period
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Period {
    /// A calendar year
    Year(i32),
    /// A month of a year, `month` in `1..=12`
    Month {
        /// Year
        year: i32,
        /// Month number
        month: u32,
    },
}

impl Period {
    /// Year the period belongs to
    pub fn year(&self) -> i32 {
        match self {
            Period::Year(y) => *y,
            Period::Month { year, .. } => *year,
        }
    }

    /// Check if both periods have the same granularity
    pub fn same_kind(&self, other: &Period) -> bool {
        matches!(
            (self, other),
            (Period::Year(_), Period::Year(_)) | (Period::Month { .. }, Period::Month { .. })
        )
    }

    fn ordinal(&self) -> i64 {
        match self {
            Period::Year(y) => i64::from(*y),
            Period::Month { year, month } => i64::from(*year) * 12 + i64::from(*month) - 1,
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Period::Year(y) => write!(f, "{}", y),
            Period::Month { year, month } => write!(f, "{}M{:02}", year, month),
        }
    }
}

/// Period codes and arithmetic
pub trait PeriodCalendar {
    /// Parse a period code
    fn parse(&self, code: &str) -> Result<Period, PeriodError>;

    /// Canonical code of a period
    fn format(&self, period: &Period) -> String;

    /// Period `nb` steps after `period` (before when negative)
    fn successor(&self, period: &Period, nb: i64) -> Period;

    /// Number of steps from `from` to `to`
    fn duration(&self, from: &Period, to: &Period) -> Result<i64, PeriodError>;

    /// Chronological order
    fn compare(&self, a: &Period, b: &Period) -> Result<Ordering, PeriodError> {
        Ok(0.cmp(&self.duration(a, b)?))
    }

    /// Code of the period `nb` steps after a code
    fn successor_code(&self, code: &str, nb: i64) -> Result<String, PeriodError> {
        let period = self.parse(code)?;
        Ok(self.format(&self.successor(&period, nb)))
    }
}

/// Eurostat period codes: `YYYY` and `YYYYMmm`
#[derive(Debug, Clone, Copy, Default)]
pub struct EurostatCalendar;

impl PeriodCalendar for EurostatCalendar {
    fn parse(&self, code: &str) -> Result<Period, PeriodError> {
        let invalid = || PeriodError::InvalidFormat(code.to_string());
        let trimmed: String = code.chars().filter(|c| !c.is_whitespace()).collect();

        match trimmed.split_once('M') {
            None => trimmed.parse().map(Period::Year).map_err(|_| invalid()),
            Some((year, month)) => {
                let year: i32 = year.parse().map_err(|_| invalid())?;
                let month: u32 = month.parse().map_err(|_| invalid())?;
                if !(1..=12).contains(&month) {
                    return Err(invalid());
                }
                Ok(Period::Month { year, month })
            }
        }
    }

    fn format(&self, period: &Period) -> String {
        period.to_string()
    }

    fn successor(&self, period: &Period, nb: i64) -> Period {
        match period {
            Period::Year(y) => Period::Year((i64::from(*y) + nb) as i32),
            Period::Month { .. } => {
                let ordinal = period.ordinal() + nb;
                Period::Month {
                    year: ordinal.div_euclid(12) as i32,
                    month: (ordinal.rem_euclid(12) + 1) as u32,
                }
            }
        }
    }

    fn duration(&self, from: &Period, to: &Period) -> Result<i64, PeriodError> {
        if !from.same_kind(to) {
            return Err(PeriodError::Incompatible(from.to_string(), to.to_string()));
        }
        Ok(to.ordinal() - from.ordinal())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse() {
        let cal = EurostatCalendar;
        assert_eq!(cal.parse("2020").unwrap(), Period::Year(2020));
        assert_eq!(cal.parse(" 2020M03 ").unwrap(), Period::Month { year: 2020, month: 3 });
        assert!(cal.parse("2020Q1").is_err());
        assert!(cal.parse("2020M13").is_err());
        assert!(cal.parse("").is_err());
    }

    #[test]
    fn test_successor_wraps_years() {
        let cal = EurostatCalendar;
        let jan = Period::Month { year: 2020, month: 1 };
        assert_eq!(cal.successor(&jan, -1), Period::Month { year: 2019, month: 12 });
        assert_eq!(cal.successor(&jan, 25), Period::Month { year: 2022, month: 2 });
        assert_eq!(cal.successor(&jan, -13), Period::Month { year: 2018, month: 12 });
        assert_eq!(cal.successor(&Period::Year(2020), -5), Period::Year(2015));
    }

    #[test]
    fn test_duration_and_compare() {
        let cal = EurostatCalendar;
        let a = cal.parse("2019M11").unwrap();
        let b = cal.parse("2020M02").unwrap();
        assert_eq!(cal.duration(&a, &b).unwrap(), 3);
        assert_eq!(cal.compare(&a, &b).unwrap(), Ordering::Less);
        assert_eq!(cal.compare(&b, &a).unwrap(), Ordering::Greater);
        assert_eq!(cal.compare(&a, &a).unwrap(), Ordering::Equal);
        assert!(cal.duration(&a, &Period::Year(2020)).is_err());
    }

    #[test]
    fn test_successor_code() {
        let cal = EurostatCalendar;
        assert_eq!(cal.successor_code("2020M12", 1).unwrap(), "2021M01");
        assert_eq!(cal.successor_code("1999 ", 1).unwrap(), "2000");
    }
}
