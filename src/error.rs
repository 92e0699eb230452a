use thiserror::Error;

/// Configuration-related errors with structured variants.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing required field: {field}")]
    MissingField { field: &'static str },

    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("failed to read config file: {0}")]
    ReadFile(#[source] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[source] toml::de::Error),
}

/// Failures while emitting run metrics to the metrics backend.
#[derive(Error, Debug)]
pub enum MetricsError {
    #[error("metrics sink is not configured")]
    Unavailable,

    #[error("failed to emit {} metric(s): {}", failures.len(), failures.join("; "))]
    Emission { failures: Vec<String> },
}

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Metrics(#[from] MetricsError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("connection error: {0}")]
    Connection(String),

    #[error("database error: {0}")]
    Database(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("arithmetic overflow computing {0}")]
    Overflow(&'static str),

    #[error("background task failed: {0}")]
    Task(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<diesel::result::Error> for Error {
    fn from(err: diesel::result::Error) -> Self {
        Error::Database(err.to_string())
    }
}

impl From<diesel::r2d2::PoolError> for Error {
    fn from(err: diesel::r2d2::PoolError) -> Self {
        Error::Connection(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_missing_field_message() {
        let err = ConfigError::MissingField { field: "database" };
        assert_eq!(err.to_string(), "missing required field: database");
    }

    #[test]
    fn config_error_converts_to_error() {
        let err: Error = ConfigError::InvalidValue {
            field: "change_days",
            reason: "must be between 1 and 365".to_string(),
        }
        .into();
        assert!(matches!(err, Error::Config(_)));
        assert_eq!(
            err.to_string(),
            "invalid value for change_days: must be between 1 and 365"
        );
    }

    #[test]
    fn metrics_emission_lists_every_failure() {
        let err = MetricsError::Emission {
            failures: vec!["duration_ms: closed".into(), "staging_record_count: closed".into()],
        };
        assert_eq!(
            err.to_string(),
            "failed to emit 2 metric(s): duration_ms: closed; staging_record_count: closed"
        );
    }

    #[test]
    fn diesel_not_found_maps_to_database() {
        let err: Error = diesel::result::Error::NotFound.into();
        assert!(matches!(err, Error::Database(_)));
    }
}
