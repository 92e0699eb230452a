//! Run metrics emission configuration.

use serde::{Deserialize, Serialize};

use crate::application::reporter::DEFAULT_METRIC_PREFIX;

/// Configuration for emitting run metrics.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct MetricsConfig {
    /// Whether run metrics are reported at all.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Prefix of every emitted metric name.
    #[serde(default = "default_prefix")]
    pub prefix: String,
    /// Prometheus textfile-collector file rewritten after every run.
    /// Without it no exporter is configured and run metrics only reach the logs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub textfile: Option<String>,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            prefix: default_prefix(),
            textfile: None,
        }
    }
}

const fn default_enabled() -> bool {
    true
}

fn default_prefix() -> String {
    DEFAULT_METRIC_PREFIX.to_string()
}
