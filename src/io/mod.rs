//! Import and export of hypercubes
//!
//! - `csv`: delimited text with a header line, flags attached to the values
//! - `json`: rows as JSON objects

pub mod csv;
pub mod json;

pub use self::csv::{CsvLoader, CsvWriter};
pub use self::json::{rows_to_json, write_json};
