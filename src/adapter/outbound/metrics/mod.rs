//! Metrics sinks backed by the `metrics` crate facade.
//!
//! [`FacadeMetricsSink`] sends samples to whatever recorder is current.
//! [`PrometheusTextfileSink`] owns a Prometheus recorder and writes its
//! snapshot to a textfile-collector file on flush.

mod prometheus;

pub use prometheus::PrometheusTextfileSink;

use crate::error::{Error, Result};
use crate::port::outbound::metrics::MetricsSink;

/// [`MetricsSink`] that forwards to the global `metrics` recorder.
#[derive(Debug, Clone, Copy, Default)]
pub struct FacadeMetricsSink;

impl FacadeMetricsSink {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl MetricsSink for FacadeMetricsSink {
    fn histogram(&self, name: &str, value: f64) -> Result<()> {
        if !value.is_finite() {
            return Err(Error::Parse(format!("{name}: non-finite sample {value}")));
        }
        metrics::histogram!(name.to_string()).record(value);
        Ok(())
    }

    fn count(&self, name: &str, value: i64) -> Result<()> {
        let increment = u64::try_from(value)
            .map_err(|_| Error::Parse(format!("{name}: counter cannot decrease by {value}")))?;
        metrics::counter!(name.to_string()).increment(increment);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_samples_without_recorder() {
        let sink = FacadeMetricsSink::new();
        assert!(sink.histogram("run.duration_ms", 12.5).is_ok());
        assert!(sink.count("run.records", 3).is_ok());
    }

    #[test]
    fn rejects_negative_count() {
        let sink = FacadeMetricsSink::new();
        assert!(matches!(sink.count("run.records", -1), Err(Error::Parse(_))));
    }

    #[test]
    fn rejects_nan_histogram() {
        let sink = FacadeMetricsSink::new();
        assert!(sink.histogram("run.duration_ms", f64::NAN).is_err());
    }
}
