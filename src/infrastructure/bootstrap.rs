//! Infrastructure bootstrap helpers for runtime wiring.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::adapter::outbound::metrics::PrometheusTextfileSink;
use crate::adapter::outbound::sqlite::database::connection::{create_pool, run_migrations};
use crate::adapter::outbound::sqlite::SqliteMetricsStore;
use crate::application::query::LatestMetricsQuery;
use crate::application::reconcile::Reconciler;
use crate::application::reporter::RunReporter;
use crate::error::Result;
use crate::infrastructure::config::settings::Config;
use crate::port::outbound::metrics::MetricsSink;

/// Open the configured database and apply pending migrations.
///
/// # Errors
/// Returns an error if the pool cannot be created or migrations fail.
pub fn open_store(config: &Config) -> Result<Arc<SqliteMetricsStore>> {
    let pool = create_pool(&config.database)?;
    run_migrations(&pool)?;
    debug!(database = %config.database, "Database ready");
    Ok(Arc::new(SqliteMetricsStore::new(pool)))
}

/// Build the run reporter from `[metrics]`.
///
/// Run metrics are exported only through a Prometheus textfile. Enabled
/// metrics without `textfile` leave the reporter without a sink.
pub fn build_reporter(config: &Config) -> RunReporter {
    let metrics = &config.metrics;
    let sink: Option<Arc<dyn MetricsSink>> = match (metrics.enabled, &metrics.textfile) {
        (false, _) => {
            info!("Run metrics disabled");
            None
        }
        (true, None) => {
            warn!("Run metrics enabled but no exporter configured, set metrics.textfile");
            None
        }
        (true, Some(path)) => {
            debug!(path = %path, "Exporting run metrics to Prometheus textfile");
            Some(Arc::new(PrometheusTextfileSink::new(path)))
        }
    };
    RunReporter::new(sink, metrics.prefix.clone())
}

/// Build a reconciler over `store` from configuration.
pub fn build_reconciler(
    config: &Config,
    store: Arc<SqliteMetricsStore>,
) -> Reconciler<SqliteMetricsStore> {
    Reconciler::new(store, config.reconcile, build_reporter(config))
}

/// Build the latest-metrics query over `store` from configuration.
pub fn build_query(
    config: &Config,
    store: Arc<SqliteMetricsStore>,
) -> LatestMetricsQuery<SqliteMetricsStore> {
    LatestMetricsQuery::new(store, config.query)
}
