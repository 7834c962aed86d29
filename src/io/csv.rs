//! Delimited text loader and writer
//!
//! The first line holds the column headers. One column holds the values
//! (`LoaderConfig::value_column`); every other column becomes a dimension.
//! Fields are read one at a time with the configured regex, so quoted fields
//! and tab separated layouts are both handled by configuration.
//!
//! # Example
//!
//! ```rust
//! use statcube::config::LoaderConfig;
//! use statcube::io::csv::CsvLoader;
//!
//! let text = "geo,time,value\nFR,2020,1.5 p\nIT,2020,:\n";
//! let loader = CsvLoader::new(LoaderConfig::default()).unwrap();
//! let hc = loader.load_str(text).unwrap();
//! assert_eq!(hc.len(), 2);
//! assert_eq!(hc.stats()[0].read().value_flagged(), "1.5p");
//! assert!(hc.stats()[1].value().is_nan());
//! ```

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use regex::Regex;
use tracing::{debug, warn};

use crate::config::LoaderConfig;
use crate::error::{LoadError, Result};
use crate::hypercube::{Criteria, Hypercube};
use crate::types::Stat;

// ============================================================================
// Loader
// ============================================================================

/// Loads hypercubes from delimited text
#[derive(Debug, Clone)]
pub struct CsvLoader {
    config: LoaderConfig,
    pattern: Regex,
    filter: Option<Criteria>,
}

impl CsvLoader {
    /// Create a loader, compiling the field pattern
    pub fn new(config: LoaderConfig) -> Result<Self> {
        let pattern = Regex::new(&format!("^(?:{})", config.field_pattern)).map_err(LoadError::from)?;
        Ok(Self {
            config,
            pattern,
            filter: None,
        })
    }

    /// Keep only the stats matching the criteria while loading
    pub fn with_filter(mut self, criteria: Criteria) -> Self {
        self.filter = Some(criteria);
        self
    }

    /// Loader configuration
    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    /// Split a line into trimmed fields, surrounding quotes removed
    pub fn split_fields(&self, line: &str) -> Vec<String> {
        let delimiter = self.config.delimiter;
        let mut fields = Vec::new();
        let mut pos = 0;
        loop {
            let rest = &line[pos..];
            let (field, consumed) = match self.pattern.captures(rest) {
                Some(caps) => {
                    let whole = caps.get(0).map_or(0, |m| m.end());
                    let field = caps.get(1).or_else(|| caps.get(0)).map_or("", |m| m.as_str());
                    (field, whole)
                }
                None => {
                    let end = rest.find(delimiter).unwrap_or(rest.len());
                    (&rest[..end], end)
                }
            };
            fields.push(unquote(field.trim()));
            pos += consumed;

            // skip anything the pattern left before the next delimiter
            match line[pos..].find(delimiter) {
                Some(offset) => pos += offset + delimiter.len_utf8(),
                None => break,
            }
        }
        fields
    }

    /// Parse a value cell into a value and flag codes
    fn parse_value(&self, cell: &str, line: usize) -> (f64, String) {
        let cell = cell.trim();
        if self.config.missing_markers.iter().any(|m| m == cell) {
            return (f64::NAN, String::new());
        }
        if let Ok(v) = cell.parse::<f64>() {
            return (v, String::new());
        }

        if self.config.split_flags {
            let split = cell
                .char_indices()
                .rev()
                .take_while(|(_, c)| c.is_ascii_alphabetic() || c.is_whitespace())
                .last()
                .map_or(cell.len(), |(i, _)| i);
            let (number, flags) = cell.split_at(split);
            let number = number.trim();
            let flags: String = flags.chars().filter(|c| !c.is_whitespace()).collect();

            if self.config.missing_markers.iter().any(|m| m == number) {
                return (f64::NAN, flags);
            }
            if let Ok(v) = number.parse::<f64>() {
                return (v, flags);
            }
        }

        warn!(line, value = cell, "Could not parse statistical value");
        (f64::NAN, String::new())
    }

    /// Load a hypercube from a reader
    pub fn load_reader<R: BufRead>(&self, reader: R) -> Result<Hypercube> {
        let mut lines = reader.lines().enumerate();

        let headers = loop {
            match lines.next() {
                Some((_, line)) => {
                    let line = line?;
                    if !line.trim().is_empty() {
                        break self.split_fields(&line);
                    }
                }
                None => return Err(LoadError::MissingHeader.into()),
            }
        };

        let value_idx = headers
            .iter()
            .position(|h| *h == self.config.value_column)
            .ok_or_else(|| LoadError::MissingValueColumn(self.config.value_column.clone()))?;
        let flags_idx = self.config.flags_column.as_ref().and_then(|name| {
            let idx = headers.iter().position(|h| h == name);
            if idx.is_none() {
                warn!(column = %name, "Flags column not found in header");
            }
            idx
        });

        let dims: Vec<(usize, &str)> = headers
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != value_idx && Some(*i) != flags_idx)
            .map(|(i, h)| (i, h.as_str()))
            .collect();
        let mut hc = Hypercube::new(dims.iter().map(|(_, h)| *h));

        let mut skipped = 0;
        for (n, line) in lines {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let fields = self.split_fields(&line);
            if fields.len() < headers.len() {
                return Err(LoadError::FieldCount {
                    line: n + 1,
                    expected: headers.len(),
                    found: fields.len(),
                }
                .into());
            }

            let (value, mut flags) = self.parse_value(&fields[value_idx], n + 1);
            if let Some(idx) = flags_idx {
                flags.push_str(&fields[idx]);
            }

            let mut stat = Stat::new(value);
            for (i, label) in &dims {
                if !fields[*i].is_empty() {
                    stat.set_dim(*label, fields[*i].as_str());
                }
            }
            stat.add_flags_from_codes(&flags);

            if let Some(filter) = &self.filter {
                if !filter.keep(&stat) {
                    skipped += 1;
                    continue;
                }
            }
            hc.add(stat);
        }

        debug!(stats = hc.len(), skipped, dims = dims.len(), "Loaded hypercube");
        Ok(hc)
    }

    /// Load a hypercube from text
    pub fn load_str(&self, text: &str) -> Result<Hypercube> {
        self.load_reader(text.as_bytes())
    }

    /// Load a hypercube from a file
    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<Hypercube> {
        let file = File::open(path)?;
        self.load_reader(BufReader::new(file))
    }

    /// Load a table holding several value columns per row
    ///
    /// Each value column becomes a stat whose `new_dim_label` coordinate is the
    /// column header. Empty value cells are skipped.
    pub fn load_multi_values<R: BufRead, S: AsRef<str>>(
        &self,
        reader: R,
        new_dim_label: &str,
        value_columns: &[S],
    ) -> Result<Hypercube> {
        let mut lines = reader.lines().enumerate();
        let headers = match lines.next() {
            Some((_, line)) => self.split_fields(&line?),
            None => return Err(LoadError::MissingHeader.into()),
        };

        let mut value_idx = Vec::with_capacity(value_columns.len());
        for column in value_columns {
            let column = column.as_ref();
            let idx = headers
                .iter()
                .position(|h| h == column)
                .ok_or_else(|| LoadError::MissingValueColumn(column.to_string()))?;
            value_idx.push((idx, column));
        }
        let dims: Vec<(usize, &str)> = headers
            .iter()
            .enumerate()
            .filter(|(i, _)| !value_idx.iter().any(|(v, _)| v == i))
            .map(|(i, h)| (i, h.as_str()))
            .collect();

        let mut hc = Hypercube::new(dims.iter().map(|(_, h)| *h).chain([new_dim_label]));
        for (n, line) in lines {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let fields = self.split_fields(&line);
            if fields.len() < headers.len() {
                return Err(LoadError::FieldCount {
                    line: n + 1,
                    expected: headers.len(),
                    found: fields.len(),
                }
                .into());
            }

            for (idx, column) in &value_idx {
                if fields[*idx].is_empty() {
                    debug!(line = n + 1, column, "No value for column");
                    continue;
                }
                let (value, flags) = self.parse_value(&fields[*idx], n + 1);
                let mut stat = Stat::new(value);
                for (i, label) in &dims {
                    if !fields[*i].is_empty() {
                        stat.set_dim(*label, fields[*i].as_str());
                    }
                }
                stat.set_dim(new_dim_label, *column);
                stat.add_flags_from_codes(&flags);

                if self.filter.as_ref().map_or(true, |f| f.keep(&stat)) {
                    hc.add(stat);
                }
            }
        }
        Ok(hc)
    }
}

/// Strip surrounding quotes; doubled quotes inside stand for one
fn unquote(field: &str) -> String {
    match field.strip_prefix('"').and_then(|f| f.strip_suffix('"')) {
        Some(inner) => inner.replace("\"\"", "\""),
        None => field.to_string(),
    }
}

// ============================================================================
// Writer
// ============================================================================

/// Writes hypercubes as delimited text
///
/// Rows are sorted by coordinates. Missing values are written with the first
/// configured missing marker; flags follow the value after a space, or go to
/// their own column when one is configured.
#[derive(Debug, Clone)]
pub struct CsvWriter {
    config: LoaderConfig,
}

impl CsvWriter {
    /// Create a writer using the same layout as a loader
    pub fn new(config: LoaderConfig) -> Self {
        Self { config }
    }

    fn quote(&self, field: &str) -> String {
        if field.contains(self.config.delimiter) || field.contains('"') {
            format!("\"{}\"", field.replace('"', "\"\""))
        } else {
            field.to_string()
        }
    }

    /// Write a hypercube; `order` sets the dimension columns (sorted labels when empty)
    pub fn write<W: Write, S: AsRef<str>>(&self, hc: &Hypercube, order: &[S], out: W) -> Result<()> {
        let mut out = BufWriter::new(out);
        let delimiter = self.config.delimiter.to_string();

        let labels: Vec<String> = if order.is_empty() {
            hc.sorted_labels()
        } else {
            order.iter().map(|s| s.as_ref().to_string()).collect()
        };
        let mut header: Vec<String> = labels.iter().map(|l| self.quote(l)).collect();
        header.push(self.quote(&self.config.value_column));
        if let Some(flags) = &self.config.flags_column {
            header.push(self.quote(flags));
        }
        writeln!(out, "{}", header.join(&delimiter))?;

        let missing = self.config.missing_markers.first().map_or("", String::as_str);
        for row in hc.rows(&labels) {
            let mut fields: Vec<String> = row
                .coords
                .iter()
                .map(|c| self.quote(c.as_deref().unwrap_or("")))
                .collect();
            let value = if row.value.is_nan() {
                missing.to_string()
            } else {
                row.value.to_string()
            };
            match &self.config.flags_column {
                Some(_) => {
                    fields.push(value);
                    fields.push(row.flags);
                }
                None if row.flags.is_empty() => fields.push(value),
                None => fields.push(format!("{} {}", value, row.flags)),
            }
            writeln!(out, "{}", fields.join(&delimiter))?;
        }
        out.flush()?;
        Ok(())
    }

    /// Write a hypercube to a file, replacing it
    pub fn save<S: AsRef<str>>(&self, hc: &Hypercube, order: &[S], path: impl AsRef<Path>) -> Result<()> {
        let file = File::create(path)?;
        self.write(hc, order, file)
    }

    /// Write a hypercube to a string
    pub fn to_string<S: AsRef<str>>(&self, hc: &Hypercube, order: &[S]) -> Result<String> {
        let mut buf = Vec::new();
        self.write(hc, order, &mut buf)?;
        String::from_utf8(buf).map_err(|e| crate::error::Error::Serialization(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::hypercube::CompareOp;
    use crate::types::Flag;

    fn loader() -> CsvLoader {
        CsvLoader::new(LoaderConfig::with_value_column("population")).unwrap()
    }

    #[test]
    fn test_split_fields() {
        let l = loader();
        assert_eq!(l.split_fields("a, b ,c"), vec!["a", "b", "c"]);
        assert_eq!(l.split_fields("\"x,y\",z"), vec!["x,y", "z"]);
        assert_eq!(l.split_fields("a,,c,"), vec!["a", "", "c", ""]);
        assert_eq!(l.split_fields("\"say \"\"hi\"\"\",x"), vec!["say \"hi\"", "x"]);
    }

    #[test]
    fn test_split_tab_fields() {
        let l = CsvLoader::new(LoaderConfig::tab_separated("value")).unwrap();
        assert_eq!(l.split_fields("a b\tc\t"), vec!["a b", "c", ""]);
    }

    #[test]
    fn test_load() {
        let text = "country,gender,year,population\n\
                    FR,F,2020,10\n\
                    FR,M,2020,9.5 ep\n\
                    IT,F,2020,:\n\
                    IT,M,2020,abc\n";
        let hc = loader().load_str(text).unwrap();
        assert_eq!(hc.len(), 4);
        assert_eq!(hc.sorted_labels(), vec!["country", "gender", "year"]);

        let second = hc.stats()[1].snapshot();
        assert_eq!(second.value, 9.5);
        assert!(second.is_flagged(Flag::Estimated));
        assert!(second.is_flagged(Flag::Provisional));
        assert!(hc.stats()[2].value().is_nan());
        assert!(hc.stats()[3].value().is_nan());
    }

    #[test]
    fn test_missing_value_with_flag() {
        let hc = loader().load_str("geo,population\nFR,: c\n").unwrap();
        let stat = hc.stats()[0].snapshot();
        assert!(stat.value.is_nan());
        assert!(stat.is_flagged(Flag::Confidential));
    }

    #[test]
    fn test_scientific_notation_is_not_a_flag() {
        let hc = loader().load_str("geo,population\nFR,1e3\n").unwrap();
        assert_eq!(hc.stats()[0].value(), 1000.0);
    }

    #[test]
    fn test_load_with_filter() {
        let text = "geo,population\nFR,1\nIT,2\nDE,3\n";
        let hc = loader()
            .with_filter(Criteria::value(CompareOp::Ge, 2.0))
            .load_str(text)
            .unwrap();
        assert_eq!(hc.len(), 2);
    }

    #[test]
    fn test_empty_cell_is_absent() {
        let hc = loader().load_str("geo,sex,population\nFR,,1\n").unwrap();
        assert_eq!(hc.stats()[0].dim("sex"), None);
        assert_eq!(hc.dim_cardinality("sex"), 1);
    }

    #[test]
    fn test_load_errors() {
        assert!(matches!(
            loader().load_str(""),
            Err(Error::Load(LoadError::MissingHeader))
        ));
        assert!(matches!(
            loader().load_str("geo,value\nFR,1\n"),
            Err(Error::Load(LoadError::MissingValueColumn(_)))
        ));
        assert!(matches!(
            loader().load_str("geo,sex,population\nFR\n"),
            Err(Error::Load(LoadError::FieldCount { line: 2, expected: 3, found: 1 }))
        ));

        let bad = LoaderConfig {
            field_pattern: "(".to_string(),
            ..LoaderConfig::default()
        };
        assert!(matches!(
            CsvLoader::new(bad),
            Err(Error::Load(LoadError::InvalidPattern(_)))
        ));
    }

    #[test]
    fn test_flags_column() {
        let config = LoaderConfig {
            flags_column: Some("flags".to_string()),
            ..LoaderConfig::with_value_column("obs")
        };
        let hc = CsvLoader::new(config).unwrap().load_str("geo,obs,flags\nFR,3,r\n").unwrap();
        assert_eq!(hc.sorted_labels(), vec!["geo"]);
        assert!(hc.stats()[0].read().is_flagged(Flag::Revised));
    }

    #[test]
    fn test_load_multi_values() {
        let text = "geo,2019,2020\nFR,1,2\nIT,3,\n";
        let hc = loader()
            .load_multi_values(text.as_bytes(), "time", &["2019", "2020"])
            .unwrap();
        assert_eq!(hc.len(), 3);
        assert_eq!(hc.sorted_labels(), vec!["geo", "time"]);
        assert_eq!(hc.dim_values("time").len(), 2);
    }

    #[test]
    fn test_write() {
        let hc = loader()
            .load_str("geo,time,population\nIT,2020,2\nFR,2020,1.5 p\nDE,2020,:\n")
            .unwrap();
        let writer = CsvWriter::new(LoaderConfig::with_value_column("population"));
        let text = writer.to_string(&hc, &["geo", "time"]).unwrap();
        assert_eq!(
            text,
            "geo,time,population\nDE,2020,:\nFR,2020,1.5 p\nIT,2020,2\n"
        );
    }

    #[test]
    fn test_write_quotes_delimiter() {
        let mut hc = Hypercube::new(["unit"]);
        hc.add(Stat::with_dims(1.0, &[("unit", "EUR,PPS")]));
        let text = CsvWriter::new(LoaderConfig::default())
            .to_string::<&str>(&hc, &[])
            .unwrap();
        assert_eq!(text, "unit,value\n\"EUR,PPS\",1\n");
    }

    #[test]
    fn test_write_doubles_quotes() {
        let mut hc = Hypercube::new(["unit"]);
        hc.add(Stat::with_dims(1.0, &[("unit", "12\" pipe")]));
        let config = LoaderConfig::default();
        let text = CsvWriter::new(config.clone()).to_string::<&str>(&hc, &[]).unwrap();
        assert_eq!(text, "unit,value\n\"12\"\" pipe\",1\n");

        let reloaded = CsvLoader::new(config).unwrap().load_str(&text).unwrap();
        assert_eq!(reloaded.stats()[0].dim("unit").as_deref(), Some("12\" pipe"));
    }
}
