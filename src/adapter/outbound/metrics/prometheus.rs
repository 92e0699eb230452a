//! Prometheus exposition through a node_exporter textfile collector.

use std::fs;
use std::path::{Path, PathBuf};

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle, PrometheusRecorder};
use tracing::debug;

use super::FacadeMetricsSink;
use crate::error::Result;
use crate::port::outbound::metrics::MetricsSink;

/// [`MetricsSink`] that records into its own Prometheus registry and writes
/// the rendered registry to `path` on [`MetricsSink::flush`].
///
/// The file is replaced atomically so the collector never reads a partial
/// snapshot.
pub struct PrometheusTextfileSink {
    recorder: PrometheusRecorder,
    handle: PrometheusHandle,
    path: PathBuf,
}

impl PrometheusTextfileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        Self {
            recorder,
            handle,
            path: path.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current registry contents in the Prometheus text format.
    #[must_use]
    pub fn render(&self) -> String {
        self.handle.render()
    }
}

impl MetricsSink for PrometheusTextfileSink {
    fn histogram(&self, name: &str, value: f64) -> Result<()> {
        metrics::with_local_recorder(&self.recorder, || {
            FacadeMetricsSink::new().histogram(name, value)
        })
    }

    fn count(&self, name: &str, value: i64) -> Result<()> {
        metrics::with_local_recorder(&self.recorder, || FacadeMetricsSink::new().count(name, value))
    }

    fn flush(&self) -> Result<()> {
        let mut staged = self.path.clone().into_os_string();
        staged.push(".tmp");
        let staged = PathBuf::from(staged);

        fs::write(&staged, self.render())?;
        fs::rename(&staged, &self.path)?;
        debug!(path = %self.path.display(), "Prometheus textfile written");
        Ok(())
    }
}
