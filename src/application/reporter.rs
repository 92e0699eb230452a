//! Emits run-level reconciliation metrics to the metrics backend.

use std::sync::Arc;

use tracing::debug;

use crate::domain::RunMetrics;
use crate::error::{MetricsError, Result};
use crate::port::outbound::metrics::MetricsSink;

/// Default prefix for every emitted metric name.
pub const DEFAULT_METRIC_PREFIX: &str = "staging_records.processing";

/// Publishes [`RunMetrics`] as one histogram and three counters.
#[derive(Clone)]
pub struct RunReporter {
    sink: Option<Arc<dyn MetricsSink>>,
    prefix: String,
}

impl RunReporter {
    pub fn new(sink: Option<Arc<dyn MetricsSink>>, prefix: impl Into<String>) -> Self {
        Self {
            sink,
            prefix: prefix.into(),
        }
    }

    /// Reporter with no backend. Every report fails with
    /// [`MetricsError::Unavailable`].
    pub fn disabled() -> Self {
        Self::new(None, DEFAULT_METRIC_PREFIX)
    }

    /// Whether a backend is configured.
    #[must_use]
    pub fn has_sink(&self) -> bool {
        self.sink.is_some()
    }

    fn name(&self, metric: &str) -> String {
        format!("{}.{metric}", self.prefix)
    }

    /// Emit every metric of the run.
    ///
    /// All four emissions and the final flush are attempted even if some
    /// fail. Failures come back as a single [`MetricsError::Emission`].
    ///
    /// # Errors
    /// Returns [`MetricsError::Unavailable`] without a sink, or
    /// [`MetricsError::Emission`] when any emission fails.
    pub fn report(&self, metrics: &RunMetrics) -> Result<()> {
        let sink = self.sink.as_ref().ok_or(MetricsError::Unavailable)?;

        let duration_ms = metrics.duration.as_secs_f64() * 1000.0;
        let counters = [
            ("staging_record_count", metrics.staging_record_count),
            ("market_id_parse_error_count", metrics.market_id_parse_error_count),
            ("transaction_error_count", metrics.transaction_error_count),
        ];

        let mut failures = Vec::new();
        let name = self.name("duration_ms");
        if let Err(e) = sink.histogram(&name, duration_ms) {
            failures.push(format!("{name}: {e}"));
        }
        for (metric, value) in counters {
            let name = self.name(metric);
            let value = i64::try_from(value).unwrap_or(i64::MAX);
            if let Err(e) = sink.count(&name, value) {
                failures.push(format!("{name}: {e}"));
            }
        }
        if let Err(e) = sink.flush() {
            failures.push(format!("flush: {e}"));
        }

        if !failures.is_empty() {
            return Err(MetricsError::Emission { failures }.into());
        }
        debug!(prefix = %self.prefix, "Run metrics reported");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::testkit::metrics::{RecordingSink, Sample};
    use std::time::Duration;

    fn run_metrics() -> RunMetrics {
        RunMetrics {
            duration: Duration::from_millis(1500),
            staging_record_count: 4,
            market_id_parse_error_count: 2,
            transaction_error_count: 1,
        }
    }

    #[test]
    fn report_emits_histogram_and_counters() {
        let sink = Arc::new(RecordingSink::new());
        let reporter = RunReporter::new(Some(sink.clone()), DEFAULT_METRIC_PREFIX);

        reporter.report(&run_metrics()).unwrap();

        let samples = sink.samples();
        assert_eq!(samples.len(), 4);
        assert_eq!(
            samples[0],
            Sample::Histogram {
                name: "staging_records.processing.duration_ms".into(),
                value: 1500.0,
            }
        );
        assert_eq!(sink.count("staging_records.processing.staging_record_count"), Some(4));
        assert_eq!(
            sink.count("staging_records.processing.market_id_parse_error_count"),
            Some(2)
        );
        assert_eq!(sink.count("staging_records.processing.transaction_error_count"), Some(1));
        assert_eq!(sink.flushes(), 1);
    }

    #[test]
    fn flush_failure_is_reported_after_emitting() {
        let sink = Arc::new(RecordingSink::new());
        sink.fail_flush();
        let reporter = RunReporter::new(Some(sink.clone()), "kpi");

        let result = reporter.report(&run_metrics());

        match result {
            Err(Error::Metrics(MetricsError::Emission { failures })) => {
                assert_eq!(failures.len(), 1);
                assert!(failures[0].starts_with("flush"));
            }
            other => panic!("expected emission error, got {other:?}"),
        }
        assert_eq!(sink.samples().len(), 4);
    }

    #[test]
    fn missing_sink_is_unavailable() {
        assert!(!RunReporter::disabled().has_sink());
        let result = RunReporter::disabled().report(&run_metrics());
        assert!(matches!(result, Err(Error::Metrics(MetricsError::Unavailable))));
    }

    #[test]
    fn failures_are_aggregated_after_trying_every_metric() {
        let sink = Arc::new(RecordingSink::new());
        sink.reject("kpi.duration_ms");
        sink.reject("kpi.transaction_error_count");
        let reporter = RunReporter::new(Some(sink.clone()), "kpi");

        let result = reporter.report(&run_metrics());

        match result {
            Err(Error::Metrics(MetricsError::Emission { failures })) => {
                assert_eq!(failures.len(), 2);
                assert!(failures[0].starts_with("kpi.duration_ms"));
            }
            other => panic!("expected emission error, got {other:?}"),
        }
        assert_eq!(sink.samples().len(), 2);
    }
}
