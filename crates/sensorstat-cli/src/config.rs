//! Configuration file support for sensorstat
//!
//! Supports both YAML and TOML configuration files.
//!
//! # Example YAML configuration:
//! ```yaml
//! # sensorstat configuration file
//!
//! input: data/sample_data.csv
//! output_prefix: data/output_
//! chunk_size: 100000
//! group_by: [site, device, metric]
//!
//! filters:
//!   site: site_0
//!   time_start: "2025-01-03 00:00:00 +0000 UTC"
//!   time_end: "2025-01-07 00:00:00 +0000 UTC"
//!   conditions:
//!     - { key: device, op: "!=", value: device_007 }
//!
//! metric_aliases:
//!   temp: temperature
//!   hum: humidity
//!   press: pressure
//!
//! outliers:
//!   enabled: true
//!   sigma: 3.0
//!
//! logging:
//!   level: info
//!   format: text
//! ```

use sensorstat_core::{Column, FilterCondition, Schema};
use sensorstat_runtime::limits::DEFAULT_CHUNK_SIZE;
use sensorstat_runtime::filter::bind_all;
use sensorstat_runtime::{ChunkSize, GroupBy, MetricNormalizer, DEFAULT_OUTLIER_SIGMA};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub const DEFAULT_INPUT: &str = "data/sample_data.csv";
pub const DEFAULT_OUTPUT_PREFIX: &str = "data/output_";

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Path to the input CSV file
    pub input: PathBuf,

    /// Prefix prepended to every output file name
    pub output_prefix: String,

    /// Rows per chunk
    pub chunk_size: usize,

    /// Grouping columns, in key order
    pub group_by: Vec<String>,

    /// Row filters
    pub filters: FilterConfig,

    /// Metric alias table (alias -> canonical name)
    pub metric_aliases: BTreeMap<String, String>,

    /// Outlier scan settings
    pub outliers: OutlierConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            input: PathBuf::from(DEFAULT_INPUT),
            output_prefix: DEFAULT_OUTPUT_PREFIX.to_string(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            group_by: GroupBy::default()
                .names()
                .into_iter()
                .map(String::from)
                .collect(),
            filters: FilterConfig::default(),
            metric_aliases: MetricNormalizer::default()
                .aliases()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            outliers: OutlierConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Row filters; every entry present must hold for a row to be kept
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    pub site: Option<String>,
    pub device: Option<String>,
    /// Matched against the metric name as read, before alias rewriting
    pub metric: Option<String>,
    /// Inclusive lower bound on `time`
    pub time_start: Option<String>,
    /// Inclusive upper bound on `time`
    pub time_end: Option<String>,
    /// Additional `key op value` conditions
    pub conditions: Vec<ConditionConfig>,
}

impl FilterConfig {
    pub fn is_empty(&self) -> bool {
        self.site.is_none()
            && self.device.is_none()
            && self.metric.is_none()
            && self.time_start.is_none()
            && self.time_end.is_none()
            && self.conditions.is_empty()
    }
}

/// One free-form filter condition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionConfig {
    pub key: String,
    #[serde(default = "default_op")]
    pub op: String,
    pub value: String,
}

fn default_op() -> String {
    "==".to_string()
}

/// Outlier scan configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutlierConfig {
    /// Run the second pass at all
    pub enabled: bool,

    /// Threshold in standard deviations
    pub sigma: f64,
}

impl Default for OutlierConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            sigma: DEFAULT_OUTLIER_SIGMA,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (text, json)
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl Config {
    /// Load configuration from a file (YAML or TOML, auto-detected by extension)
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::IoError(path.to_path_buf(), e.to_string()))?;

        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();

        match extension.as_str() {
            "yaml" | "yml" => Self::from_yaml(&content),
            "toml" => Self::from_toml(&content),
            _ => {
                // Try YAML first, then TOML
                Self::from_yaml(&content).or_else(|_| Self::from_toml(&content))
            }
        }
    }

    /// Parse configuration from YAML string
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Parse configuration from TOML string
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Merge another config into this one (other values take precedence if set)
    pub fn merge(&mut self, other: Config) {
        let defaults = Config::default();

        if other.input != defaults.input {
            self.input = other.input;
        }
        if other.output_prefix != defaults.output_prefix {
            self.output_prefix = other.output_prefix;
        }
        if other.chunk_size != defaults.chunk_size {
            self.chunk_size = other.chunk_size;
        }
        if other.group_by != defaults.group_by {
            self.group_by = other.group_by;
        }
        if other.metric_aliases != defaults.metric_aliases {
            self.metric_aliases = other.metric_aliases;
        }

        // Merge filters field by field
        if other.filters.site.is_some() {
            self.filters.site = other.filters.site;
        }
        if other.filters.device.is_some() {
            self.filters.device = other.filters.device;
        }
        if other.filters.metric.is_some() {
            self.filters.metric = other.filters.metric;
        }
        if other.filters.time_start.is_some() {
            self.filters.time_start = other.filters.time_start;
        }
        if other.filters.time_end.is_some() {
            self.filters.time_end = other.filters.time_end;
        }
        self.filters.conditions.extend(other.filters.conditions);

        if !other.outliers.enabled {
            self.outliers.enabled = false;
        }
        if other.outliers.sigma != defaults.outliers.sigma {
            self.outliers.sigma = other.outliers.sigma;
        }

        if other.logging.level != defaults.logging.level {
            self.logging.level = other.logging.level;
        }
        if other.logging.format != defaults.logging.format {
            self.logging.format = other.logging.format;
        }
    }

    /// Filter conditions described by the `filters` section, ANDed together.
    pub fn filter_conditions(&self) -> Result<Vec<FilterCondition>, ConfigError> {
        let f = &self.filters;
        let mut conditions = Vec::new();

        let equalities = [
            (Column::Site, &f.site),
            (Column::Device, &f.device),
            (Column::Metric, &f.metric),
        ];
        for (column, value) in equalities {
            if let Some(value) = value {
                conditions.push(FilterCondition::equals(column.name(), value.as_str()));
            }
        }

        let bounds = [(">=", &f.time_start), ("<=", &f.time_end)];
        for (op, bound) in bounds {
            if let Some(bound) = bound {
                conditions.push(parse_condition(Column::Time.name(), op, bound)?);
            }
        }

        for c in &f.conditions {
            conditions.push(parse_condition(&c.key, &c.op, &c.value)?);
        }

        Ok(conditions)
    }

    pub fn group_by(&self) -> Result<GroupBy, ConfigError> {
        GroupBy::from_names(&self.group_by).map_err(|e| ConfigError::Invalid(e.to_string()))
    }

    pub fn chunk_size(&self) -> Result<ChunkSize, ConfigError> {
        ChunkSize::new(self.chunk_size).map_err(|e| ConfigError::Invalid(e.to_string()))
    }

    pub fn normalizer(&self) -> Result<MetricNormalizer, ConfigError> {
        MetricNormalizer::new(
            self.metric_aliases
                .iter()
                .map(|(k, v)| (k.as_str(), v.as_str())),
        )
        .map_err(|e| ConfigError::Invalid(e.to_string()))
    }

    /// Check every section that can be checked without reading the input.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.chunk_size()?;
        self.group_by()?;
        self.normalizer()?;
        let conditions = self.filter_conditions()?;
        bind_all(&conditions, &Schema::sensor())
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        if !self.outliers.sigma.is_finite() || self.outliers.sigma <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "outliers.sigma must be a positive number, got {}",
                self.outliers.sigma
            )));
        }
        Ok(())
    }

    /// Create an example configuration
    pub fn example() -> Self {
        Self {
            filters: FilterConfig {
                site: Some("site_0".to_string()),
                time_start: Some("2025-01-03 00:00:00 +0000 UTC".to_string()),
                time_end: Some("2025-01-07 00:00:00 +0000 UTC".to_string()),
                conditions: vec![ConditionConfig {
                    key: "device".to_string(),
                    op: "!=".to_string(),
                    value: "device_007".to_string(),
                }],
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// Generate example YAML configuration
    pub fn example_yaml() -> String {
        serde_yaml::to_string(&Self::example()).unwrap_or_default()
    }

    /// Generate example TOML configuration
    pub fn example_toml() -> String {
        toml::to_string_pretty(&Self::example()).unwrap_or_default()
    }
}

fn parse_condition(key: &str, op: &str, value: &str) -> Result<FilterCondition, ConfigError> {
    FilterCondition::parse(key, op, value)
        .map_err(|e| ConfigError::Invalid(format!("filter '{} {} {}': {}", key, op, value, e)))
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {0}: {1}")]
    IoError(PathBuf, String),

    #[error("Failed to parse config: {0}")]
    ParseError(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
