//! Engine configuration
//!
//! Configuration of the query runtime. Supports layered configuration:
//! 1. Defaults (single worker, log-and-continue)
//! 2. YAML documents (`EngineConfig::from_yaml_str` / `EngineConfig::from_file`)
//! 3. Environment variables (`EngineConfig::from_env`)
//! 4. Per-statement property overrides (`ConfiguredStatement::with_overrides`)
//!
//! ```yaml
//! workers: 4
//! channel_capacity: 1024
//! processing_error_policy: fail
//! join:
//!   grace_ms: 60000
//!   max_lateness_ms: 5000
//!   max_records_per_store: 1000000
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::Path;
use thiserror::Error;

pub const WORKERS_PROPERTY: &str = "velostream.workers";
pub const CHANNEL_CAPACITY_PROPERTY: &str = "velostream.channel.capacity";
pub const ERROR_POLICY_PROPERTY: &str = "velostream.processing.error.policy";
pub const JOIN_GRACE_PROPERTY: &str = "velostream.join.grace.ms";
pub const JOIN_MAX_LATENESS_PROPERTY: &str = "velostream.join.max.lateness.ms";
pub const JOIN_MAX_RECORDS_PROPERTY: &str = "velostream.join.max.records.per.store";

/// Configuration errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {message}")]
    Io { path: String, message: String },

    #[error("Failed to parse config: {message}")]
    Parse { message: String },

    #[error("Unknown config property '{name}'")]
    UnknownProperty { name: String },

    #[error("Invalid value '{value}' for config property '{name}': {reason}")]
    InvalidValue {
        name: String,
        value: String,
        reason: String,
    },
}

impl ConfigError {
    fn invalid(name: &str, value: &str, reason: impl Into<String>) -> Self {
        ConfigError::InvalidValue {
            name: name.to_string(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}

/// What a query does when a record fails with a data-quality error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingErrorPolicy {
    /// Report the error, skip the record and keep going
    #[default]
    LogAndContinue,
    /// Report the error and stop the query
    Fail,
}

impl std::str::FromStr for ProcessingErrorPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "log_and_continue" | "log-and-continue" | "continue" => {
                Ok(ProcessingErrorPolicy::LogAndContinue)
            }
            "fail" => Ok(ProcessingErrorPolicy::Fail),
            other => Err(format!("expected 'log_and_continue' or 'fail', got '{}'", other)),
        }
    }
}

/// Defaults applied to stream-stream joins that do not specify their own
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JoinDefaults {
    /// Grace period after a window closes (ms)
    pub grace_ms: i64,
    /// Maximum lateness before a record is dropped (ms)
    pub max_lateness_ms: i64,
    /// Per-store record cap; `None` means unbounded
    pub max_records_per_store: Option<usize>,
    /// Fraction of the cap at which a warning is logged
    pub warning_threshold_pct: f64,
}

impl Default for JoinDefaults {
    fn default() -> Self {
        Self {
            grace_ms: 0,
            max_lateness_ms: 0,
            max_records_per_store: None,
            warning_threshold_pct: 0.8,
        }
    }
}

/// Runtime configuration for query execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Number of partition workers per query
    pub workers: usize,
    /// Capacity of each worker's input channel
    pub channel_capacity: usize,
    /// Handling of per-record data-quality errors
    pub processing_error_policy: ProcessingErrorPolicy,
    /// Stream-stream join defaults
    pub join: JoinDefaults,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            workers: 1,
            channel_capacity: 1024,
            processing_error_policy: ProcessingErrorPolicy::LogAndContinue,
            join: JoinDefaults::default(),
        }
    }
}

impl EngineConfig {
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig =
            serde_yaml::from_str(yaml).map_err(|e| ConfigError::Parse {
                message: e.to_string(),
            })?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::from_yaml_str(&content)
    }

    /// Load configuration from environment variables with fallback to defaults
    ///
    /// - `VELOSTREAM_WORKERS` - partition workers per query (default: 1)
    /// - `VELOSTREAM_CHANNEL_CAPACITY` - worker input channel capacity (default: 1024)
    /// - `VELOSTREAM_ERROR_POLICY` - `log_and_continue` or `fail`
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let workers = env::var("VELOSTREAM_WORKERS")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .filter(|w| *w > 0)
            .unwrap_or(defaults.workers);

        let channel_capacity = env::var("VELOSTREAM_CHANNEL_CAPACITY")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .filter(|c| *c > 0)
            .unwrap_or(defaults.channel_capacity);

        let processing_error_policy = env::var("VELOSTREAM_ERROR_POLICY")
            .ok()
            .and_then(|v| v.parse::<ProcessingErrorPolicy>().ok())
            .unwrap_or(defaults.processing_error_policy);

        Self {
            workers,
            channel_capacity,
            processing_error_policy,
            join: defaults.join,
        }
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity;
        self
    }

    pub fn with_error_policy(mut self, policy: ProcessingErrorPolicy) -> Self {
        self.processing_error_policy = policy;
        self
    }

    pub fn with_join_defaults(mut self, join: JoinDefaults) -> Self {
        self.join = join;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.workers == 0 {
            return Err(ConfigError::invalid(WORKERS_PROPERTY, "0", "must be at least 1"));
        }
        if self.channel_capacity == 0 {
            return Err(ConfigError::invalid(
                CHANNEL_CAPACITY_PROPERTY,
                "0",
                "must be at least 1",
            ));
        }
        if !(0.0..=1.0).contains(&self.join.warning_threshold_pct) {
            return Err(ConfigError::invalid(
                "join.warning_threshold_pct",
                &self.join.warning_threshold_pct.to_string(),
                "must be between 0 and 1",
            ));
        }
        Ok(())
    }

    /// Apply a single property override by name
    pub fn apply_override(&mut self, name: &str, value: &str) -> Result<(), ConfigError> {
        fn parse<T: std::str::FromStr>(name: &str, value: &str) -> Result<T, ConfigError>
        where
            T::Err: std::fmt::Display,
        {
            value
                .trim()
                .parse::<T>()
                .map_err(|e| ConfigError::invalid(name, value, e.to_string()))
        }

        match name {
            WORKERS_PROPERTY => self.workers = parse(name, value)?,
            CHANNEL_CAPACITY_PROPERTY => self.channel_capacity = parse(name, value)?,
            ERROR_POLICY_PROPERTY => self.processing_error_policy = parse(name, value)?,
            JOIN_GRACE_PROPERTY => self.join.grace_ms = parse(name, value)?,
            JOIN_MAX_LATENESS_PROPERTY => self.join.max_lateness_ms = parse(name, value)?,
            JOIN_MAX_RECORDS_PROPERTY => {
                self.join.max_records_per_store = Some(parse(name, value)?)
            }
            _ => {
                return Err(ConfigError::UnknownProperty {
                    name: name.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Get a summary of the configuration for logging
    pub fn summary(&self) -> String {
        format!(
            "Engine configuration: workers={}, channel_capacity={}, error_policy={:?}, join_grace={}ms, join_max_lateness={}ms",
            self.workers,
            self.channel_capacity,
            self.processing_error_policy,
            self.join.grace_ms,
            self.join.max_lateness_ms,
        )
    }
}

/// A statement together with the configuration it runs under
#[derive(Debug, Clone)]
pub struct ConfiguredStatement<T> {
    statement: T,
    statement_text: String,
    overrides: HashMap<String, String>,
    config: EngineConfig,
}

impl<T> ConfiguredStatement<T> {
    pub fn new(statement: T, statement_text: impl Into<String>, config: EngineConfig) -> Self {
        Self {
            statement,
            statement_text: statement_text.into(),
            overrides: HashMap::new(),
            config,
        }
    }

    pub fn statement(&self) -> &T {
        &self.statement
    }

    pub fn statement_text(&self) -> &str {
        &self.statement_text
    }

    pub fn overrides(&self) -> &HashMap<String, String> {
        &self.overrides
    }

    /// Base configuration with all overrides applied
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn into_statement(self) -> T {
        self.statement
    }

    /// Replace the base configuration, re-applying the current overrides
    pub fn with_config(self, config: EngineConfig) -> Result<Self, ConfigError> {
        let overrides = self.overrides;
        Self {
            statement: self.statement,
            statement_text: self.statement_text,
            overrides: HashMap::new(),
            config,
        }
        .with_overrides(overrides)
    }

    /// Apply property overrides on top of the current configuration.
    ///
    /// Either every override applies or the statement is left unchanged.
    pub fn with_overrides(mut self, overrides: HashMap<String, String>) -> Result<Self, ConfigError> {
        let mut config = self.config.clone();
        let mut names: Vec<&String> = overrides.keys().collect();
        names.sort();
        for name in names {
            config.apply_override(name, &overrides[name])?;
        }
        config.validate()?;

        self.config = config;
        self.overrides.extend(overrides);
        Ok(self)
    }
}
