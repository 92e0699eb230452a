//! Database model types for Diesel ORM.
//!
//! Decimal KPI values are stored as TEXT to keep their exact scale, and
//! timestamps as RFC 3339 TEXT in UTC.

use diesel::prelude::*;

use super::schema::{
    active_provider_markets, calculated_provider_metrics, historical_provider_metrics,
    staging_provider_metrics,
};

/// Database row for a staging metric (queryable).
#[derive(Queryable, Selectable, Debug, Clone)]
#[diesel(table_name = staging_provider_metrics)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct StagingRow {
    pub id: i64,
    pub provider_id: i64,
    pub care_requests_completed_last_seven_days: i64,
    pub average_net_promoter_score: Option<String>,
    pub chart_closure_rate: Option<String>,
    pub survey_capture_rate: Option<String>,
    pub median_on_scene_time_secs: Option<i32>,
    pub last_care_request_completed_at: Option<String>,
    pub completed_care_requests: i64,
    pub market_ids: Option<String>,
    pub created_at: String,
}

/// Database row for a staging metric (insertable).
#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = staging_provider_metrics)]
pub struct NewStagingRow {
    pub provider_id: i64,
    pub care_requests_completed_last_seven_days: i64,
    pub average_net_promoter_score: Option<String>,
    pub chart_closure_rate: Option<String>,
    pub survey_capture_rate: Option<String>,
    pub median_on_scene_time_secs: Option<i32>,
    pub last_care_request_completed_at: Option<String>,
    pub completed_care_requests: i64,
    pub market_ids: Option<String>,
    pub created_at: String,
}

/// Database row for a historical metric (queryable).
#[derive(Queryable, Selectable, Debug, Clone)]
#[diesel(table_name = historical_provider_metrics)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct HistoricalRow {
    pub id: i64,
    pub provider_id: i64,
    pub care_requests_completed_last_seven_days: i64,
    pub average_net_promoter_score: Option<String>,
    pub chart_closure_rate: Option<String>,
    pub survey_capture_rate: Option<String>,
    pub median_on_scene_time_secs: Option<i32>,
    pub last_care_request_completed_at: Option<String>,
    pub completed_care_requests: i64,
    pub created_at: String,
}

/// Database row for a historical metric (insertable).
#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = historical_provider_metrics)]
pub struct NewHistoricalRow {
    pub provider_id: i64,
    pub care_requests_completed_last_seven_days: i64,
    pub average_net_promoter_score: Option<String>,
    pub chart_closure_rate: Option<String>,
    pub survey_capture_rate: Option<String>,
    pub median_on_scene_time_secs: Option<i32>,
    pub last_care_request_completed_at: Option<String>,
    pub completed_care_requests: i64,
    pub created_at: String,
}

/// Database row for a calculated metric.
#[derive(Queryable, Selectable, Insertable, Debug, Clone)]
#[diesel(table_name = calculated_provider_metrics)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct CalculatedRow {
    pub provider_id: i64,
    pub care_requests_completed_last_seven_days: i64,
    pub average_net_promoter_score: Option<String>,
    pub average_net_promoter_score_change: Option<String>,
    pub chart_closure_rate: Option<String>,
    pub chart_closure_rate_change: Option<String>,
    pub survey_capture_rate: Option<String>,
    pub survey_capture_rate_change: Option<String>,
    pub median_on_scene_time_secs: Option<i32>,
    pub median_on_scene_time_secs_change: Option<i32>,
    pub last_care_request_completed_at: Option<String>,
    pub completed_care_requests: i64,
    pub change_days: i32,
    pub created_at: String,
    pub updated_at: String,
}

/// Columns replaced when a calculated row already exists.
///
/// Leaves `provider_id` and `created_at` untouched. `None` clears the
/// column so that a delta that became unknown does not keep a stale value.
#[derive(AsChangeset, Debug, Clone)]
#[diesel(table_name = calculated_provider_metrics)]
#[diesel(treat_none_as_null = true)]
pub struct CalculatedChangeset {
    pub care_requests_completed_last_seven_days: i64,
    pub average_net_promoter_score: Option<String>,
    pub average_net_promoter_score_change: Option<String>,
    pub chart_closure_rate: Option<String>,
    pub chart_closure_rate_change: Option<String>,
    pub survey_capture_rate: Option<String>,
    pub survey_capture_rate_change: Option<String>,
    pub median_on_scene_time_secs: Option<i32>,
    pub median_on_scene_time_secs_change: Option<i32>,
    pub last_care_request_completed_at: Option<String>,
    pub completed_care_requests: i64,
    pub change_days: i32,
    pub updated_at: String,
}

impl From<&CalculatedRow> for CalculatedChangeset {
    fn from(row: &CalculatedRow) -> Self {
        Self {
            care_requests_completed_last_seven_days: row.care_requests_completed_last_seven_days,
            average_net_promoter_score: row.average_net_promoter_score.clone(),
            average_net_promoter_score_change: row.average_net_promoter_score_change.clone(),
            chart_closure_rate: row.chart_closure_rate.clone(),
            chart_closure_rate_change: row.chart_closure_rate_change.clone(),
            survey_capture_rate: row.survey_capture_rate.clone(),
            survey_capture_rate_change: row.survey_capture_rate_change.clone(),
            median_on_scene_time_secs: row.median_on_scene_time_secs,
            median_on_scene_time_secs_change: row.median_on_scene_time_secs_change,
            last_care_request_completed_at: row.last_care_request_completed_at.clone(),
            completed_care_requests: row.completed_care_requests,
            change_days: row.change_days,
            updated_at: row.updated_at.clone(),
        }
    }
}

/// Database row for an active provider/market membership.
#[derive(Queryable, Selectable, Insertable, Debug, Clone, PartialEq, Eq)]
#[diesel(table_name = active_provider_markets)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct ActiveMarketRow {
    pub provider_id: i64,
    pub market_id: i64,
}
