//! `config.toml` for the reconciliation CLI.
//!
//! Every section is optional and falls back to its defaults. The database
//! path can also come from `CLINICAL_KPI_DATABASE` or `--database`.
//!
//! ```no_run
//! use clinical_kpi::infrastructure::config::settings::Config;
//!
//! # fn main() -> clinical_kpi::error::Result<()> {
//! let config = Config::load_or_default("config.toml")?;
//! config.init_logging();
//! println!("delta window: {} days", config.reconcile.change_days);
//! # Ok(())
//! # }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use super::logging::LoggingConfig;
use super::metrics::MetricsConfig;
use crate::application::query::QueryConfig;
use crate::application::reconcile::ReconcileConfig;
use crate::error::{ConfigError, Error, Result};

/// Environment variable that replaces the configured database path.
pub const DATABASE_ENV: &str = "CLINICAL_KPI_DATABASE";

const MAX_CHANGE_DAYS: i32 = 365;

/// Effective settings of one CLI invocation.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// SQLite file holding staging, historical and calculated metrics.
    #[serde(default = "default_database_path")]
    pub database: String,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub reconcile: ReconcileConfig,

    #[serde(default)]
    pub query: QueryConfig,

    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: default_database_path(),
            logging: LoggingConfig::default(),
            reconcile: ReconcileConfig::default(),
            query: QueryConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

fn default_database_path() -> String {
    "clinical_kpi.db".to_string()
}

fn invalid(field: &'static str, reason: impl Into<String>) -> Error {
    ConfigError::InvalidValue {
        field,
        reason: reason.into(),
    }
    .into()
}

impl Config {
    /// Parse TOML, apply `CLINICAL_KPI_DATABASE`, then [`validate`](Self::validate).
    ///
    /// # Errors
    /// [`ConfigError::Parse`] for malformed TOML, or the validation error.
    pub fn parse_toml(content: &str) -> Result<Self> {
        let mut config: Self = toml::from_str(content).map_err(ConfigError::Parse)?;
        config.override_database(std::env::var(DATABASE_ENV).ok());
        config.validate()?;
        Ok(config)
    }

    /// Read and parse the file at `path`.
    ///
    /// # Errors
    /// [`ConfigError::ReadFile`] if the file is unreadable, otherwise as
    /// [`parse_toml`](Self::parse_toml).
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadFile)?;
        Self::parse_toml(&content)
    }

    /// Like [`load`](Self::load), but a missing file means all defaults.
    ///
    /// # Errors
    /// As [`load`](Self::load) when the file exists.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        if path.as_ref().exists() {
            return Self::load(path);
        }
        Self::parse_toml("")
    }

    /// Replace the database path unless `database` is absent or blank.
    pub fn override_database(&mut self, database: Option<String>) {
        if let Some(database) = database.filter(|d| !d.trim().is_empty()) {
            self.database = database;
        }
    }

    /// Check value ranges. Reports the first offending field.
    ///
    /// # Errors
    /// [`ConfigError::MissingField`] for a blank database path or metric
    /// prefix, [`ConfigError::InvalidValue`] for out-of-range numbers.
    pub fn validate(&self) -> Result<()> {
        if self.database.trim().is_empty() {
            return Err(ConfigError::MissingField { field: "database" }.into());
        }
        if !(1..=MAX_CHANGE_DAYS).contains(&self.reconcile.change_days) {
            return Err(invalid(
                "change_days",
                format!("must be between 1 and {MAX_CHANGE_DAYS}"),
            ));
        }
        if self.query.completed_care_requests_threshold < 0 {
            return Err(invalid("completed_care_requests_threshold", "must not be negative"));
        }
        if self.query.active_within_days < 1 {
            return Err(invalid("active_within_days", "must be at least 1"));
        }
        if self.metrics.prefix.trim().is_empty() {
            return Err(ConfigError::MissingField {
                field: "metrics.prefix",
            }
            .into());
        }
        if self.metrics.textfile.as_deref().is_some_and(|path| path.trim().is_empty()) {
            return Err(invalid("metrics.textfile", "must not be blank"));
        }
        Ok(())
    }

    /// The effective settings as TOML, for `config show`.
    ///
    /// # Errors
    /// Returns [`Error::Parse`] if serialization fails.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::Parse(e.to_string()))
    }

    pub fn init_logging(&self) {
        self.logging.init();
    }
}
