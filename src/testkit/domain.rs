//! Builders for KPI records used across tests.

use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;

use crate::domain::{KpiSnapshot, Measurement, NewHistoricalMetric, NewStagingMetric, ProviderId};

/// Fixed "now" shared by tests: 2026-10-19 02:00 UTC.
pub fn now() -> DateTime<Utc> {
    at(19, 2)
}

/// A UTC timestamp in October 2026.
///
/// # Panics
/// Panics if `day` or `hour` is out of range.
pub fn at(day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 10, day, hour, 0, 0)
        .single()
        .unwrap_or_else(|| panic!("invalid test timestamp: day {day} hour {hour}"))
}

/// KPI snapshot with every value known.
pub fn kpis(nps: Decimal, chart_closure: Decimal, on_scene_secs: i32) -> KpiSnapshot {
    KpiSnapshot {
        care_requests_completed_last_seven_days: 12,
        average_net_promoter_score: Measurement::Known(nps),
        chart_closure_rate: Measurement::Known(chart_closure),
        survey_capture_rate: Measurement::Known(Decimal::new(75, 2)),
        median_on_scene_time_secs: Some(on_scene_secs),
        last_care_request_completed_at: Some(at(18, 20)),
        completed_care_requests: 250,
    }
}

/// Staging row for `provider` carrying `market_ids` verbatim.
pub fn staging(provider: i64, kpis: KpiSnapshot, market_ids: Option<&str>) -> NewStagingMetric {
    NewStagingMetric {
        provider_id: ProviderId::new(provider),
        kpis,
        market_ids: market_ids.map(str::to_string),
    }
}

/// Historical snapshot for `provider` taken at `created_at`.
pub fn historical(
    provider: i64,
    kpis: KpiSnapshot,
    created_at: DateTime<Utc>,
) -> NewHistoricalMetric {
    NewHistoricalMetric {
        provider_id: ProviderId::new(provider),
        kpis,
        created_at,
    }
}
