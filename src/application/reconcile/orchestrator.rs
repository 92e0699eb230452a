//! Reconciliation run over all pending staging rows.
//!
//! Each staging row is handled in its own transaction:
//!
//! 1. Append a historical snapshot of the staging values.
//! 2. Look up the oldest snapshot inside the delta window, excluding the one
//!    just written.
//! 3. With a baseline, compute deltas and upsert the calculated row. Without
//!    one, no calculated row is written.
//! 4. Reconcile the provider's active markets.
//! 5. Delete the staging row and commit.
//!
//! A failing step rolls back only its own record; the staging row stays for
//! the next run. A row whose stored values cannot be read is counted as a
//! failed record and left staged.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Duration, NaiveTime, Utc};
use tracing::{debug, error, info, warn};

use super::config::ReconcileConfig;
use super::markets::reconcile_active_markets;
use crate::application::reporter::RunReporter;
use crate::domain::{
    parse_market_ids, CalculatedMetricUpsert, KpiDeltas, MalformedStagingRecord,
    NewHistoricalMetric, RecordOutcome, RecordStep, RunMetrics, StagingMetricRecord,
};
use crate::error::{Error, MetricsError, Result};
use crate::port::outbound::store::MetricsStore;

/// Start of the delta window: UTC midnight of `now`, `change_days` days back.
///
/// # Errors
/// Returns [`Error::Overflow`] if the window reaches outside the supported
/// date range.
pub fn window_cutoff(now: DateTime<Utc>, change_days: i32) -> Result<DateTime<Utc>> {
    let midnight = now.date_naive().and_time(NaiveTime::MIN).and_utc();
    Duration::try_days(i64::from(change_days))
        .and_then(|window| midnight.checked_sub_signed(window))
        .ok_or(Error::Overflow("delta window cutoff"))
}

/// Drives reconciliation of staging rows into historical, calculated, and
/// membership records.
pub struct Reconciler<S> {
    store: Arc<S>,
    config: ReconcileConfig,
    reporter: RunReporter,
    cancelled: Arc<AtomicBool>,
}

impl<S: MetricsStore> Reconciler<S> {
    pub fn new(store: Arc<S>, config: ReconcileConfig, reporter: RunReporter) -> Self {
        Self {
            store,
            config,
            reporter,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Share an externally owned cancellation flag.
    #[must_use]
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancelled = flag;
        self
    }

    /// Flag that stops the run before its next record once set.
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancelled)
    }

    pub fn config(&self) -> &ReconcileConfig {
        &self.config
    }

    /// Reconcile every pending staging row as of the current time.
    ///
    /// # Errors
    /// Returns an error only if the pending rows cannot be fetched or the
    /// delta window cannot be computed. Per-record failures are counted in
    /// [`RunMetrics::transaction_error_count`].
    pub fn run(&self) -> Result<RunMetrics> {
        self.run_at(Utc::now())
    }

    /// Reconcile every pending staging row as of `now`.
    ///
    /// # Errors
    /// See [`Reconciler::run`].
    pub fn run_at(&self, now: DateTime<Utc>) -> Result<RunMetrics> {
        let started = Instant::now();
        let pending = self.store.pending_staging()?;
        let mut metrics = RunMetrics {
            staging_record_count: pending.len(),
            ..RunMetrics::default()
        };

        if pending.is_empty() {
            info!("No staging metrics to reconcile");
            metrics.duration = started.elapsed();
            self.report(&metrics);
            return Ok(metrics);
        }

        let cutoff = window_cutoff(now, self.config.change_days)?;
        info!(
            records = pending.len(),
            change_days = self.config.change_days,
            cutoff = %cutoff,
            "Reconciling staging metrics"
        );

        for (processed, staging) in pending.iter().enumerate() {
            if self.cancelled.load(Ordering::SeqCst) {
                warn!(
                    processed,
                    remaining = pending.len() - processed,
                    "Reconciliation cancelled"
                );
                break;
            }
            let outcome = match staging {
                Ok(staging) => self.process_record(staging, cutoff, now),
                Err(malformed) => skip_malformed(malformed),
            };
            metrics.record(&outcome);
        }

        metrics.duration = started.elapsed();
        info!(
            records = metrics.staging_record_count,
            market_id_parse_errors = metrics.market_id_parse_error_count,
            transaction_errors = metrics.transaction_error_count,
            duration_ms = metrics.duration.as_millis() as u64,
            "Reconciliation finished"
        );
        self.report(&metrics);
        Ok(metrics)
    }

    fn report(&self, metrics: &RunMetrics) {
        match self.reporter.report(metrics) {
            Ok(()) => {}
            Err(Error::Metrics(MetricsError::Unavailable)) => {
                info!("Metrics sink not configured, run metrics not reported");
            }
            Err(e) => warn!(error = %e, "Failed to report run metrics"),
        }
    }

    fn process_record(
        &self,
        staging: &StagingMetricRecord,
        cutoff: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> RecordOutcome {
        let provider_id = staging.provider_id;
        let (market_ids, parse_errors) = parse_market_ids(staging.market_ids.as_deref());
        for e in &parse_errors {
            warn!(
                provider_id = %provider_id,
                staging_id = staging.id,
                error = %e,
                "Skipping market id"
            );
        }

        let mut step = RecordStep::Transaction;
        let mut counted_parse_errors = 0;
        let result = self.store.in_transaction(|tx| {
            step = RecordStep::InsertHistorical;
            let snapshot = tx.insert_historical(&NewHistoricalMetric::from_staging(staging, now))?;

            step = RecordStep::FindBaseline;
            let baseline = tx.oldest_historical_since(provider_id, cutoff, snapshot.id)?;

            if let Some(baseline) = &baseline {
                let (deltas, failures) = KpiDeltas::between(&staging.kpis, &baseline.kpis);
                for e in &failures {
                    warn!(provider_id = %provider_id, error = %e, "Delta left unknown");
                }

                step = RecordStep::UpsertCalculated;
                tx.upsert_calculated(&CalculatedMetricUpsert {
                    provider_id,
                    kpis: staging.kpis.clone(),
                    deltas,
                    change_days: self.config.change_days,
                    at: now,
                })?;
            }

            step = RecordStep::ReconcileMarkets;
            counted_parse_errors = parse_errors.len();
            reconcile_active_markets(tx, provider_id, &market_ids)?;

            step = RecordStep::DeleteStaging;
            tx.delete_staging(staging.id)?;

            step = RecordStep::Transaction;
            Ok(baseline.map(|b| b.id))
        });

        match result {
            Ok(Some(baseline_id)) => {
                debug!(
                    provider_id = %provider_id,
                    staging_id = staging.id,
                    baseline_id,
                    "Record reconciled"
                );
                RecordOutcome::Reconciled {
                    provider_id,
                    market_id_parse_errors: parse_errors.len(),
                }
            }
            Ok(None) => {
                debug!(
                    provider_id = %provider_id,
                    staging_id = staging.id,
                    "No baseline in window"
                );
                RecordOutcome::NoBaseline {
                    provider_id,
                    market_id_parse_errors: parse_errors.len(),
                }
            }
            Err(e) => {
                error!(
                    provider_id = %provider_id,
                    staging_id = staging.id,
                    step = %step,
                    error = %e,
                    "Record rolled back"
                );
                RecordOutcome::RolledBack {
                    provider_id,
                    step,
                    reason: e.to_string(),
                    market_id_parse_errors: counted_parse_errors,
                }
            }
        }
    }
}

fn skip_malformed(malformed: &MalformedStagingRecord) -> RecordOutcome {
    error!(
        provider_id = %malformed.provider_id,
        staging_id = malformed.id,
        step = %RecordStep::Decode,
        error = %malformed.reason,
        "Record rolled back"
    );
    RecordOutcome::RolledBack {
        provider_id: malformed.provider_id,
        step: RecordStep::Decode,
        reason: malformed.reason.clone(),
        market_id_parse_errors: 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{MarketId, Measurement, ProviderId};
    use crate::testkit::domain::{at, historical, kpis, now, staging};
    use crate::testkit::metrics::RecordingSink;
    use crate::testkit::store::{FailAt, MemoryMetricsStore};
    use rust_decimal_macros::dec;

    fn reconciler(store: &Arc<MemoryMetricsStore>) -> Reconciler<MemoryMetricsStore> {
        Reconciler::new(Arc::clone(store), ReconcileConfig::default(), RunReporter::disabled())
    }

    fn markets(ids: &[i64]) -> Vec<MarketId> {
        ids.iter().copied().map(MarketId::new).collect()
    }

    #[test]
    fn window_cutoff_is_midnight_change_days_back() {
        assert_eq!(window_cutoff(now(), 7).unwrap(), at(12, 0));
        assert_eq!(window_cutoff(at(19, 23), 1).unwrap(), at(18, 0));
    }

    #[test]
    fn window_cutoff_rejects_out_of_range_window() {
        assert!(matches!(window_cutoff(now(), i32::MAX), Err(Error::Overflow(_))));
    }

    #[test]
    fn empty_batch_reports_zeros_and_touches_nothing() {
        let store = Arc::new(MemoryMetricsStore::new());
        let sink = Arc::new(RecordingSink::new());
        let reporter = RunReporter::new(Some(sink.clone()), "kpi");
        let reconciler = Reconciler::new(Arc::clone(&store), ReconcileConfig::default(), reporter);

        let metrics = reconciler.run_at(now()).unwrap();

        assert_eq!(metrics.staging_record_count, 0);
        assert_eq!(metrics.transaction_error_count, 0);
        assert_eq!(store.transaction_count(), 0);
        assert_eq!(sink.count("kpi.staging_record_count"), Some(0));
        assert_eq!(sink.count("kpi.transaction_error_count"), Some(0));
    }

    #[test]
    fn deltas_use_oldest_snapshot_in_window() {
        let store = Arc::new(MemoryMetricsStore::new());
        store.seed_historical(&historical(1, kpis(dec!(90), dec!(0.5), 1000), at(11, 23)));
        store.seed_historical(&historical(1, kpis(dec!(100), dec!(0.85), 2100), at(12, 0)));
        store.seed_historical(&historical(1, kpis(dec!(70), dec!(0.9), 1900), at(16, 8)));
        store
            .add_staging(&staging(1, kpis(dec!(58), dec!(0.91), 1800), Some("4|5")))
            .unwrap();

        let metrics = reconciler(&store).run_at(now()).unwrap();

        assert_eq!(metrics.transaction_error_count, 0);
        let calculated = store.calculated_for_provider(ProviderId::new(1)).unwrap().unwrap();
        assert_eq!(
            calculated.deltas.average_net_promoter_score_change,
            Measurement::Known(dec!(-42))
        );
        assert_eq!(calculated.deltas.chart_closure_rate_change, Measurement::Known(dec!(0.06)));
        assert_eq!(calculated.deltas.median_on_scene_time_secs_change, Some(-300));
        assert_eq!(calculated.change_days, 7);
        assert_eq!(calculated.created_at, now());
        assert_eq!(
            store.active_markets_for_provider(ProviderId::new(1)).unwrap(),
            markets(&[4, 5])
        );
        assert!(store.pending_staging().unwrap().is_empty());
        assert_eq!(store.historical_for_provider(ProviderId::new(1)).unwrap().len(), 4);
    }

    #[test]
    fn unknown_values_give_unknown_deltas() {
        let store = Arc::new(MemoryMetricsStore::new());
        let mut baseline = kpis(dec!(80), dec!(0.8), 2000);
        baseline.chart_closure_rate = Measurement::Unknown;
        store.seed_historical(&historical(2, baseline, at(13, 0)));
        let mut current = kpis(dec!(82), dec!(0.9), 2000);
        current.median_on_scene_time_secs = None;
        store.add_staging(&staging(2, current, None)).unwrap();

        reconciler(&store).run_at(now()).unwrap();

        let deltas = store.calculated_for_provider(ProviderId::new(2)).unwrap().unwrap().deltas;
        assert_eq!(deltas.average_net_promoter_score_change, Measurement::Known(dec!(2)));
        assert_eq!(deltas.chart_closure_rate_change, Measurement::Unknown);
        assert_eq!(deltas.median_on_scene_time_secs_change, None);
    }

    #[test]
    fn no_baseline_keeps_snapshot_and_consumes_staging() {
        let store = Arc::new(MemoryMetricsStore::new());
        store.seed_historical(&historical(3, kpis(dec!(60), dec!(0.7), 1500), at(11, 23)));
        let row = store
            .add_staging(&staging(3, kpis(dec!(65), dec!(0.75), 1400), Some("8")))
            .unwrap();

        let outcome = reconciler(&store).process_record(&row, at(12, 0), now());

        assert_eq!(
            outcome,
            RecordOutcome::NoBaseline {
                provider_id: ProviderId::new(3),
                market_id_parse_errors: 0,
            }
        );
        assert!(store.calculated_for_provider(ProviderId::new(3)).unwrap().is_none());
        assert_eq!(store.historical_for_provider(ProviderId::new(3)).unwrap().len(), 2);
        assert_eq!(store.active_markets_for_provider(ProviderId::new(3)).unwrap(), markets(&[8]));
        assert!(store.pending_staging().unwrap().is_empty());
    }

    #[test]
    fn failing_record_is_isolated() {
        let store = Arc::new(MemoryMetricsStore::new());
        for provider in 1..=3 {
            let baseline = kpis(dec!(50), dec!(0.5), 1000);
            store.seed_historical(&historical(provider, baseline, at(14, 0)));
            store
                .add_staging(&staging(provider, kpis(dec!(55), dec!(0.6), 900), Some("1|x")))
                .unwrap();
        }
        store.fail_at(ProviderId::new(2), FailAt::UpsertCalculated);

        let metrics = reconciler(&store).run_at(now()).unwrap();

        assert_eq!(metrics.staging_record_count, 3);
        assert_eq!(metrics.transaction_error_count, 1);
        assert_eq!(metrics.market_id_parse_error_count, 2);

        let pending = store.pending_staging().unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].as_ref().unwrap().provider_id, ProviderId::new(2));
        assert!(store.calculated_for_provider(ProviderId::new(2)).unwrap().is_none());
        assert_eq!(store.historical_for_provider(ProviderId::new(2)).unwrap().len(), 1);
        assert!(store.active_markets_for_provider(ProviderId::new(2)).unwrap().is_empty());
        for provider in [1, 3] {
            assert!(store.calculated_for_provider(ProviderId::new(provider)).unwrap().is_some());
        }
    }

    #[test]
    fn rollback_reports_failing_step() {
        let store = Arc::new(MemoryMetricsStore::new());
        store.fail_at(ProviderId::new(4), FailAt::DeleteStaging);
        let row = store
            .add_staging(&staging(4, kpis(dec!(1), dec!(1), 1), Some("3|abc|")))
            .unwrap();

        let outcome = reconciler(&store).process_record(&row, at(12, 0), now());

        match outcome {
            RecordOutcome::RolledBack {
                step,
                market_id_parse_errors,
                ..
            } => {
                assert_eq!(step, RecordStep::DeleteStaging);
                assert_eq!(market_id_parse_errors, 2);
            }
            other => panic!("expected rollback, got {other:?}"),
        }
        assert!(store.historical_for_provider(ProviderId::new(4)).unwrap().is_empty());
        assert!(store.active_markets_for_provider(ProviderId::new(4)).unwrap().is_empty());
    }

    #[test]
    fn malformed_row_is_skipped_and_left_staged() {
        let store = Arc::new(MemoryMetricsStore::new());
        store.seed_historical(&historical(7, kpis(dec!(30), dec!(0.3), 300), at(13, 0)));
        let bad_id = store.add_malformed_staging(ProviderId::new(9), "invalid decimal \"n/a\"");
        store.add_staging(&staging(7, kpis(dec!(35), dec!(0.4), 280), None)).unwrap();

        let metrics = reconciler(&store).run_at(now()).unwrap();

        assert_eq!(metrics.staging_record_count, 2);
        assert_eq!(metrics.transaction_error_count, 1);
        assert!(store.calculated_for_provider(ProviderId::new(7)).unwrap().is_some());
        let pending = store.pending_staging().unwrap();
        assert_eq!(pending.len(), 1);
        let malformed = pending[0].as_ref().unwrap_err();
        assert_eq!(malformed.id, bad_id);
        assert_eq!(malformed.provider_id, ProviderId::new(9));
    }

    #[test]
    fn fetch_failure_is_fatal() {
        let store = Arc::new(MemoryMetricsStore::new());
        store.fail_pending_staging();

        assert!(reconciler(&store).run_at(now()).is_err());
    }

    #[test]
    fn cancelled_run_stops_before_next_record() {
        let store = Arc::new(MemoryMetricsStore::new());
        store.add_staging(&staging(5, kpis(dec!(1), dec!(1), 1), None)).unwrap();
        let reconciler = reconciler(&store);
        reconciler.cancel_flag().store(true, Ordering::SeqCst);

        let metrics = reconciler.run_at(now()).unwrap();

        assert_eq!(metrics.staging_record_count, 1);
        assert_eq!(store.transaction_count(), 0);
        assert_eq!(store.pending_staging().unwrap().len(), 1);
    }

    #[test]
    fn rerun_after_success_is_a_no_op() {
        let store = Arc::new(MemoryMetricsStore::new());
        store.seed_historical(&historical(6, kpis(dec!(40), dec!(0.4), 600), at(13, 0)));
        store.add_staging(&staging(6, kpis(dec!(45), dec!(0.5), 500), Some("2"))).unwrap();
        let reconciler = reconciler(&store);

        reconciler.run_at(now()).unwrap();
        let calculated = store.calculated();
        let second = reconciler.run_at(now()).unwrap();

        assert_eq!(second.staging_record_count, 0);
        assert_eq!(store.calculated(), calculated);
        assert_eq!(store.historical_for_provider(ProviderId::new(6)).unwrap().len(), 2);
    }
}
