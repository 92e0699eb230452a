//! Metrics emission port.

use crate::error::Result;

/// Backend that receives run-level metrics (a statsd agent, a Prometheus
/// registry, a log line).
pub trait MetricsSink: Send + Sync {
    /// Record one sample of a distribution.
    fn histogram(&self, name: &str, value: f64) -> Result<()>;

    /// Increment a counter by `value`.
    fn count(&self, name: &str, value: i64) -> Result<()>;

    /// Push buffered samples to the backend. Called once per run report.
    fn flush(&self) -> Result<()> {
        Ok(())
    }
}
