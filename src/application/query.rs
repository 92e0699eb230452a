//! Read side for dashboards: latest calculated metrics per provider.
//!
//! Providers below the completed-care-request threshold have their KPI values
//! and deltas withheld. Only their counts are returned.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{CalculatedMetricRecord, KpiDeltas, MarketId, Measurement, ProviderId};
use crate::error::{Error, Result};
use crate::port::outbound::store::MetricsStore;

/// Configuration for latest-metrics queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct QueryConfig {
    /// Providers with fewer completed care requests have their KPIs withheld.
    #[serde(default = "default_threshold")]
    pub completed_care_requests_threshold: i64,
    /// Market listings only include providers whose last completed care
    /// request falls within this many days.
    #[serde(default = "default_active_within_days")]
    pub active_within_days: i32,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            completed_care_requests_threshold: default_threshold(),
            active_within_days: default_active_within_days(),
        }
    }
}

const fn default_threshold() -> i64 {
    80
}

const fn default_active_within_days() -> i32 {
    30
}

/// KPI values and their changes over the delta window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KpiView {
    pub average_net_promoter_score: Measurement,
    pub chart_closure_rate: Measurement,
    pub survey_capture_rate: Measurement,
    pub median_on_scene_time_secs: Option<i32>,
    #[serde(flatten)]
    pub changes: KpiDeltas,
    pub change_days: i32,
}

/// Latest metrics of one provider as shown to a dashboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProviderMetricsView {
    pub provider_id: ProviderId,
    pub care_requests_completed_last_seven_days: i64,
    pub completed_care_requests: i64,
    pub last_care_request_completed_at: Option<DateTime<Utc>>,
    /// True when the provider has too few completed care requests for the
    /// KPIs to be shown.
    pub withheld: bool,
    /// `None` when withheld.
    pub kpis: Option<KpiView>,
    pub updated_at: DateTime<Utc>,
}

impl ProviderMetricsView {
    fn from_record(record: CalculatedMetricRecord, threshold: i64) -> Self {
        let withheld = record.kpis.completed_care_requests < threshold;
        let kpis = (!withheld).then(|| KpiView {
            average_net_promoter_score: record.kpis.average_net_promoter_score,
            chart_closure_rate: record.kpis.chart_closure_rate,
            survey_capture_rate: record.kpis.survey_capture_rate,
            median_on_scene_time_secs: record.kpis.median_on_scene_time_secs,
            changes: record.deltas,
            change_days: record.change_days,
        });

        Self {
            provider_id: record.provider_id,
            care_requests_completed_last_seven_days: record
                .kpis
                .care_requests_completed_last_seven_days,
            completed_care_requests: record.kpis.completed_care_requests,
            last_care_request_completed_at: record.kpis.last_care_request_completed_at,
            withheld,
            kpis,
            updated_at: record.updated_at,
        }
    }
}

/// Latest-metrics queries over a [`MetricsStore`].
pub struct LatestMetricsQuery<S> {
    store: Arc<S>,
    config: QueryConfig,
}

impl<S: MetricsStore> LatestMetricsQuery<S> {
    pub fn new(store: Arc<S>, config: QueryConfig) -> Self {
        Self { store, config }
    }

    /// Latest calculated metrics for a provider, if any were ever calculated.
    ///
    /// # Errors
    /// Returns an error if the store cannot be read.
    pub fn latest_for_provider(
        &self,
        provider_id: ProviderId,
    ) -> Result<Option<ProviderMetricsView>> {
        let record = self.store.calculated_for_provider(provider_id)?;
        Ok(record.map(|r| {
            ProviderMetricsView::from_record(r, self.config.completed_care_requests_threshold)
        }))
    }

    /// Latest metrics of the market's providers that completed a care
    /// request within `active_within_days` of `now`, ordered by provider.
    ///
    /// # Errors
    /// Returns an error if the store cannot be read or the window is out of
    /// range.
    pub fn latest_for_market(
        &self,
        market_id: MarketId,
        active_within_days: i32,
        now: DateTime<Utc>,
    ) -> Result<Vec<ProviderMetricsView>> {
        let active_after = Duration::try_days(i64::from(active_within_days))
            .and_then(|window| now.checked_sub_signed(window))
            .ok_or(Error::Overflow("market activity window"))?;

        let providers = self.store.active_providers_for_market(market_id)?;
        if providers.is_empty() {
            return Ok(Vec::new());
        }

        let threshold = self.config.completed_care_requests_threshold;
        Ok(self
            .store
            .calculated_active_after(&providers, active_after)?
            .into_iter()
            .map(|r| ProviderMetricsView::from_record(r, threshold))
            .collect())
    }

    /// [`latest_for_market`](Self::latest_for_market) with the configured
    /// activity window and the current time.
    ///
    /// # Errors
    /// See [`latest_for_market`](Self::latest_for_market).
    pub fn latest_for_market_now(&self, market_id: MarketId) -> Result<Vec<ProviderMetricsView>> {
        self.latest_for_market(market_id, self.config.active_within_days, Utc::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::reconcile::{ReconcileConfig, Reconciler};
    use crate::application::reporter::RunReporter;
    use crate::testkit::domain::{at, historical, kpis, now, staging};
    use crate::testkit::store::MemoryMetricsStore;
    use rust_decimal_macros::dec;

    fn reconciled_store(rows: &[(i64, i64, DateTime<Utc>, &str)]) -> Arc<MemoryMetricsStore> {
        let store = Arc::new(MemoryMetricsStore::new());
        for (provider, completed, last, markets) in rows {
            let mut snapshot = kpis(dec!(70), dec!(0.9), 1500);
            snapshot.completed_care_requests = *completed;
            snapshot.last_care_request_completed_at = Some(*last);
            let baseline = kpis(dec!(60), dec!(0.8), 1600);
            store.seed_historical(&historical(*provider, baseline, at(13, 0)));
            store.add_staging(&staging(*provider, snapshot, Some(markets))).unwrap();
        }
        Reconciler::new(Arc::clone(&store), ReconcileConfig::default(), RunReporter::disabled())
            .run_at(now())
            .unwrap();
        store
    }

    #[test]
    fn provider_above_threshold_shows_kpis() {
        let store = reconciled_store(&[(1, 120, at(18, 9), "1")]);
        let query = LatestMetricsQuery::new(store, QueryConfig::default());

        let view = query.latest_for_provider(ProviderId::new(1)).unwrap().unwrap();

        assert!(!view.withheld);
        let kpis = view.kpis.unwrap();
        assert_eq!(kpis.average_net_promoter_score, Measurement::Known(dec!(70)));
        assert_eq!(kpis.changes.average_net_promoter_score_change, Measurement::Known(dec!(10)));
        assert_eq!(kpis.changes.median_on_scene_time_secs_change, Some(-100));
    }

    #[test]
    fn provider_below_threshold_is_withheld() {
        let store = reconciled_store(&[(2, 79, at(18, 9), "1")]);
        let query = LatestMetricsQuery::new(store, QueryConfig::default());

        let view = query.latest_for_provider(ProviderId::new(2)).unwrap().unwrap();

        assert!(view.withheld);
        assert!(view.kpis.is_none());
        assert_eq!(view.completed_care_requests, 79);
    }

    #[test]
    fn unknown_provider_has_no_metrics() {
        let query =
            LatestMetricsQuery::new(Arc::new(MemoryMetricsStore::new()), QueryConfig::default());
        assert!(query.latest_for_provider(ProviderId::new(404)).unwrap().is_none());
    }

    #[test]
    fn market_lists_recently_active_providers() {
        let store = reconciled_store(&[
            (1, 120, at(18, 9), "5|6"),
            (2, 120, at(1, 9), "5"),
            (3, 10, at(17, 9), "5"),
            (4, 120, at(18, 9), "6"),
        ]);
        let query = LatestMetricsQuery::new(store, QueryConfig::default());

        let views = query.latest_for_market(MarketId::new(5), 7, now()).unwrap();

        let ids: Vec<i64> = views.iter().map(|v| v.provider_id.get()).collect();
        assert_eq!(ids, vec![1, 3]);
        assert!(views[1].withheld);
    }

    #[test]
    fn withheld_view_serializes_without_kpis() {
        let store = reconciled_store(&[(2, 5, at(18, 9), "1")]);
        let query = LatestMetricsQuery::new(store, QueryConfig::default());
        let view = query.latest_for_provider(ProviderId::new(2)).unwrap().unwrap();

        let json = serde_json::to_value(&view).unwrap();

        assert_eq!(json["withheld"], serde_json::Value::Bool(true));
        assert!(json["kpis"].is_null());
    }
}
