//! Provider KPI records at each stage of reconciliation.
//!
//! A [`StagingMetricRecord`] is produced upstream and consumed once. Each
//! consumed staging row becomes an immutable [`HistoricalMetricRecord`], and
//! the provider's single [`CalculatedMetricRecord`] is replaced with the new
//! values plus their deltas against a historical baseline.

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use super::id::ProviderId;
use super::measurement::{seconds_delta, Measurement};
use crate::error::Error;

/// KPI values shared by staging, historical, and calculated records.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct KpiSnapshot {
    pub care_requests_completed_last_seven_days: i64,
    pub average_net_promoter_score: Measurement,
    pub chart_closure_rate: Measurement,
    pub survey_capture_rate: Measurement,
    pub median_on_scene_time_secs: Option<i32>,
    pub last_care_request_completed_at: Option<DateTime<Utc>>,
    /// Lifetime count of completed care requests.
    pub completed_care_requests: i64,
}

/// A freshly computed KPI row awaiting reconciliation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagingMetricRecord {
    pub id: i64,
    pub provider_id: ProviderId,
    pub kpis: KpiSnapshot,
    /// `|`-delimited identifiers of the markets the provider is active in.
    pub market_ids: Option<String>,
}

/// A staging row whose stored values could not be decoded.
///
/// It stays staged and fails only its own record; the rest of the batch is
/// still reconciled.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("staging metric {id} for provider {provider_id} is malformed: {reason}")]
pub struct MalformedStagingRecord {
    pub id: i64,
    pub provider_id: ProviderId,
    pub reason: String,
}

/// One fetched staging row: decoded, or the reason it could not be.
pub type PendingStaging = std::result::Result<StagingMetricRecord, MalformedStagingRecord>;

/// A staging row to be written by a producer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewStagingMetric {
    pub provider_id: ProviderId,
    pub kpis: KpiSnapshot,
    pub market_ids: Option<String>,
}

/// An immutable KPI snapshot used as a delta baseline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistoricalMetricRecord {
    pub id: i64,
    pub provider_id: ProviderId,
    pub kpis: KpiSnapshot,
    pub created_at: DateTime<Utc>,
}

/// A historical snapshot to be appended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewHistoricalMetric {
    pub provider_id: ProviderId,
    pub kpis: KpiSnapshot,
    pub created_at: DateTime<Utc>,
}

impl NewHistoricalMetric {
    /// Snapshot the values of a staging row at `created_at`.
    #[must_use]
    pub fn from_staging(staging: &StagingMetricRecord, created_at: DateTime<Utc>) -> Self {
        Self {
            provider_id: staging.provider_id,
            kpis: staging.kpis.clone(),
            created_at,
        }
    }
}

/// Changes of each KPI relative to a baseline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct KpiDeltas {
    pub average_net_promoter_score_change: Measurement,
    pub chart_closure_rate_change: Measurement,
    pub survey_capture_rate_change: Measurement,
    pub median_on_scene_time_secs_change: Option<i32>,
}

impl KpiDeltas {
    /// Compute `current - baseline` for every KPI.
    ///
    /// A delta that fails to compute is left unknown and its error is
    /// returned alongside the deltas so the caller can log it.
    #[must_use]
    pub fn between(current: &KpiSnapshot, baseline: &KpiSnapshot) -> (Self, Vec<Error>) {
        let mut failures = Vec::new();
        let mut decimal = |new: Measurement, old: Measurement, field: &'static str| {
            Measurement::checked_delta(new, old, field).unwrap_or_else(|e| {
                failures.push(e);
                Measurement::Unknown
            })
        };

        let average_net_promoter_score_change = decimal(
            current.average_net_promoter_score,
            baseline.average_net_promoter_score,
            "average_net_promoter_score",
        );
        let chart_closure_rate_change = decimal(
            current.chart_closure_rate,
            baseline.chart_closure_rate,
            "chart_closure_rate",
        );
        let survey_capture_rate_change = decimal(
            current.survey_capture_rate,
            baseline.survey_capture_rate,
            "survey_capture_rate",
        );
        let median_on_scene_time_secs_change = seconds_delta(
            current.median_on_scene_time_secs,
            baseline.median_on_scene_time_secs,
        )
        .unwrap_or_else(|e| {
            failures.push(e);
            None
        });

        (
            Self {
                average_net_promoter_score_change,
                chart_closure_rate_change,
                survey_capture_rate_change,
                median_on_scene_time_secs_change,
            },
            failures,
        )
    }
}

/// The authoritative latest KPI row for a provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CalculatedMetricRecord {
    pub provider_id: ProviderId,
    pub kpis: KpiSnapshot,
    pub deltas: KpiDeltas,
    /// Length of the delta window in days.
    pub change_days: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Values written when replacing a provider's calculated row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalculatedMetricUpsert {
    pub provider_id: ProviderId,
    pub kpis: KpiSnapshot,
    pub deltas: KpiDeltas,
    pub change_days: i32,
    /// Timestamp recorded as `updated_at`, and as `created_at` on first insert.
    pub at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn snapshot(nps: Option<Decimal>, ccr: Option<Decimal>, secs: Option<i32>) -> KpiSnapshot {
        KpiSnapshot {
            average_net_promoter_score: nps.into(),
            chart_closure_rate: ccr.into(),
            survey_capture_rate: Some(dec!(0.5)).into(),
            median_on_scene_time_secs: secs,
            ..KpiSnapshot::default()
        }
    }

    #[test]
    fn deltas_between_fully_known_snapshots() {
        let current = snapshot(Some(dec!(58)), Some(dec!(0.91)), Some(1800));
        let baseline = snapshot(Some(dec!(100)), Some(dec!(0.85)), Some(2100));

        let (deltas, failures) = KpiDeltas::between(&current, &baseline);

        assert!(failures.is_empty());
        assert_eq!(deltas.average_net_promoter_score_change, Measurement::Known(dec!(-42)));
        assert_eq!(deltas.chart_closure_rate_change, Measurement::Known(dec!(0.06)));
        assert_eq!(deltas.survey_capture_rate_change, Measurement::Known(dec!(0)));
        assert_eq!(deltas.median_on_scene_time_secs_change, Some(-300));
    }

    #[test]
    fn missing_baseline_values_leave_deltas_unknown() {
        let current = snapshot(Some(dec!(70)), None, Some(1800));
        let baseline = snapshot(None, Some(dec!(0.85)), None);

        let (deltas, failures) = KpiDeltas::between(&current, &baseline);

        assert!(failures.is_empty());
        assert_eq!(deltas.average_net_promoter_score_change, Measurement::Unknown);
        assert_eq!(deltas.chart_closure_rate_change, Measurement::Unknown);
        assert_eq!(deltas.median_on_scene_time_secs_change, None);
    }

    #[test]
    fn overflowing_delta_is_reported_and_unknown() {
        let current = snapshot(Some(Decimal::MAX), Some(dec!(1)), Some(i32::MIN));
        let baseline = snapshot(Some(Decimal::MIN), Some(dec!(1)), Some(1));

        let (deltas, failures) = KpiDeltas::between(&current, &baseline);

        assert_eq!(failures.len(), 2);
        assert_eq!(deltas.average_net_promoter_score_change, Measurement::Unknown);
        assert_eq!(deltas.chart_closure_rate_change, Measurement::Known(dec!(0)));
        assert_eq!(deltas.median_on_scene_time_secs_change, None);
    }

    #[test]
    fn historical_from_staging_copies_values() {
        let staging = StagingMetricRecord {
            id: 9,
            provider_id: ProviderId::new(3),
            kpis: snapshot(Some(dec!(60)), None, None),
            market_ids: Some("1|2".into()),
        };
        let at = Utc::now();
        let historical = NewHistoricalMetric::from_staging(&staging, at);
        assert_eq!(historical.provider_id, ProviderId::new(3));
        assert_eq!(historical.kpis, staging.kpis);
        assert_eq!(historical.created_at, at);
    }
}
