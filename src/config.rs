//! Configuration management for statcube
//!
//! This module provides configuration file support with TOML format,
//! environment variable overrides, and sensible defaults. Nothing in the
//! crate reads global state: analyses and loaders take the relevant section
//! of a [`Config`] explicitly.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    /// Analysis thresholds
    #[serde(default)]
    pub analysis: AnalysisConfig,

    /// Tabular loader settings
    #[serde(default)]
    pub loader: LoaderConfig,
}

/// Analysis configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AnalysisConfig {
    /// Ignore NaN values when computing compacity
    #[serde(default)]
    pub compacity_ignore_nan: bool,

    /// Ignore zero values when computing compacity
    #[serde(default)]
    pub compacity_ignore_zero: bool,

    /// Time series outlier detection
    #[serde(default)]
    pub outlier: OutlierConfig,
}

/// Outlier detection thresholds
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct OutlierConfig {
    /// Half width of the moving average window
    #[serde(default = "default_half_window")]
    pub half_window: usize,

    /// Half width of the residual dispersion window (defaults to twice the trend window)
    #[serde(default)]
    pub dispersion_window: Option<usize>,

    /// Minimum ratio between a residual and the local dispersion
    #[serde(default = "default_th_nb_std")]
    pub th_nb_std: f64,

    /// Minimum residual
    #[serde(default = "default_diff_th")]
    pub diff_th: f64,

    /// Report negative residuals too
    #[serde(default)]
    pub two_sided: bool,

    /// Windows with a missing period give NaN instead of a partial result
    #[serde(default)]
    pub all_should_be_there: bool,
}

/// Tabular loader configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct LoaderConfig {
    /// Header of the column holding the values
    #[serde(default = "default_value_column")]
    pub value_column: String,

    /// Field separator
    #[serde(default = "default_delimiter")]
    pub delimiter: char,

    /// Regex matching one field at the start of the remaining line; group 1
    /// is the field content
    #[serde(default = "default_field_pattern")]
    pub field_pattern: String,

    /// Split trailing flag codes off the value cell (`12.5 ep`)
    #[serde(default = "default_true")]
    pub split_flags: bool,

    /// Optional column holding flag codes
    #[serde(default)]
    pub flags_column: Option<String>,

    /// Value cells meaning "missing" (loaded as NaN without warning)
    #[serde(default = "default_missing_markers")]
    pub missing_markers: Vec<String>,
}

// Default value functions
fn default_half_window() -> usize { 2 }
fn default_th_nb_std() -> f64 { 2.0 }
fn default_diff_th() -> f64 { 1.0 }
fn default_value_column() -> String { "value".to_string() }
fn default_delimiter() -> char { ',' }
fn default_field_pattern() -> String { r#"\s*("(?:[^"]|"")*"|[^,]*)\s*"#.to_string() }
fn default_missing_markers() -> Vec<String> { vec![":".to_string(), String::new()] }
fn default_true() -> bool { true }

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            compacity_ignore_nan: false,
            compacity_ignore_zero: false,
            outlier: OutlierConfig::default(),
        }
    }
}

impl Default for OutlierConfig {
    fn default() -> Self {
        Self {
            half_window: default_half_window(),
            dispersion_window: None,
            th_nb_std: default_th_nb_std(),
            diff_th: default_diff_th(),
            two_sided: false,
            all_should_be_there: false,
        }
    }
}

impl OutlierConfig {
    /// Half width of the dispersion window actually used
    pub fn dispersion_half_window(&self) -> usize {
        self.dispersion_window.unwrap_or(2 * self.half_window)
    }
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            value_column: default_value_column(),
            delimiter: default_delimiter(),
            field_pattern: default_field_pattern(),
            split_flags: true,
            flags_column: None,
            missing_markers: default_missing_markers(),
        }
    }
}

impl LoaderConfig {
    /// Loader for a given value column, other settings by default
    pub fn with_value_column(value_column: impl Into<String>) -> Self {
        Self {
            value_column: value_column.into(),
            ..Self::default()
        }
    }

    /// Tab separated layout
    pub fn tab_separated(value_column: impl Into<String>) -> Self {
        Self {
            value_column: value_column.into(),
            delimiter: '\t',
            field_pattern: "([^\t]*)".to_string(),
            ..Self::default()
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            Error::Configuration(format!("Failed to read config file {}: {}", path.display(), e))
        })?;

        Ok(toml::from_str(&contents)?)
    }

    /// Load configuration with environment variable overrides
    pub fn from_file_with_env(path: impl AsRef<Path>) -> Result<Self> {
        let mut config = Self::from_file(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from environment variables only
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env_overrides();
        config
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) {
        // Loader
        if let Ok(column) = std::env::var("STATCUBE_VALUE_COLUMN") {
            self.loader.value_column = column;
        }
        if let Ok(delimiter) = std::env::var("STATCUBE_DELIMITER") {
            if let Some(c) = delimiter.chars().next() {
                self.loader.delimiter = c;
            }
        }
        if let Ok(pattern) = std::env::var("STATCUBE_FIELD_PATTERN") {
            self.loader.field_pattern = pattern;
        }

        // Outliers
        let outlier = &mut self.analysis.outlier;
        if let Ok(w) = std::env::var("STATCUBE_OUTLIER_WINDOW") {
            if let Ok(w) = w.parse() {
                outlier.half_window = w;
            }
        }
        if let Ok(w) = std::env::var("STATCUBE_OUTLIER_DISPERSION_WINDOW") {
            if let Ok(w) = w.parse() {
                outlier.dispersion_window = Some(w);
            }
        }
        if let Ok(th) = std::env::var("STATCUBE_OUTLIER_TH_NB_STD") {
            if let Ok(th) = th.parse() {
                outlier.th_nb_std = th;
            }
        }
        if let Ok(th) = std::env::var("STATCUBE_OUTLIER_DIFF_TH") {
            if let Ok(th) = th.parse() {
                outlier.diff_th = th;
            }
        }
        if let Ok(b) = std::env::var("STATCUBE_OUTLIER_TWO_SIDED") {
            if let Ok(b) = b.parse() {
                outlier.two_sided = b;
            }
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        let outlier = &self.analysis.outlier;
        if outlier.half_window == 0 {
            return Err(Error::Configuration("Outlier half window must be > 0".to_string()));
        }
        if outlier.dispersion_window == Some(0) {
            return Err(Error::Configuration(
                "Outlier dispersion window must be > 0".to_string(),
            ));
        }
        if !(outlier.th_nb_std.is_finite() && outlier.th_nb_std > 0.0) {
            return Err(Error::Configuration(
                "Outlier std threshold must be a positive number".to_string(),
            ));
        }
        if !(outlier.diff_th.is_finite() && outlier.diff_th >= 0.0) {
            return Err(Error::Configuration(
                "Outlier difference threshold must be >= 0".to_string(),
            ));
        }

        if self.loader.value_column.is_empty() {
            return Err(Error::Configuration("Value column cannot be empty".to_string()));
        }
        if let Err(e) = regex::Regex::new(&self.loader.field_pattern) {
            return Err(Error::Configuration(format!("Invalid field pattern: {}", e)));
        }

        Ok(())
    }

    /// Save configuration to a TOML file
    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| Error::Configuration(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, contents)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.analysis.outlier.half_window, 2);
        assert_eq!(config.analysis.outlier.dispersion_half_window(), 4);
        assert_eq!(config.loader.value_column, "value");
        assert!(config.loader.split_flags);
    }

    #[test]
    fn test_config_validation() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_thresholds() {
        let mut config = Config::default();
        config.analysis.outlier.th_nb_std = 0.0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.analysis.outlier.half_window = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.loader.field_pattern = "(".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_toml() {
        let config: Config = toml::from_str(
            r#"
            [analysis.outlier]
            half_window = 3
            two_sided = true

            [loader]
            value_column = "population"
            "#,
        )
        .unwrap();
        assert_eq!(config.analysis.outlier.half_window, 3);
        assert_eq!(config.analysis.outlier.dispersion_half_window(), 6);
        assert!(config.analysis.outlier.two_sided);
        assert_eq!(config.loader.value_column, "population");
        assert_eq!(config.loader.delimiter, ',');
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("statcube.toml");

        let mut config = Config::default();
        config.analysis.outlier.dispersion_window = Some(5);
        config.loader = LoaderConfig::tab_separated("obs");
        config.save_to_file(&path).unwrap();

        let reloaded = Config::from_file(&path).unwrap();
        assert_eq!(reloaded.analysis.outlier, config.analysis.outlier);
        assert_eq!(reloaded.loader, config.loader);
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            Config::from_file("/nonexistent/statcube.toml"),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn test_env_override() {
        std::env::set_var("STATCUBE_OUTLIER_TH_NB_STD", "3.5");
        let config = Config::from_env();
        assert_eq!(config.analysis.outlier.th_nb_std, 3.5);
        std::env::remove_var("STATCUBE_OUTLIER_TH_NB_STD");
    }
}
