//! SQLite KPI metrics store implementation.
//!
//! Provides persistent storage for staging, historical, and calculated
//! provider metrics plus active market memberships using SQLite and Diesel
//! ORM.

use std::str::FromStr;

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use diesel::prelude::*;
use diesel::SqliteConnection;
use rust_decimal::Decimal;

use super::database::connection::DbPool;
use super::database::model::{
    ActiveMarketRow, CalculatedChangeset, CalculatedRow, HistoricalRow, NewHistoricalRow,
    NewStagingRow, StagingRow,
};
use super::database::schema::{
    active_provider_markets, calculated_provider_metrics, historical_provider_metrics,
    staging_provider_metrics,
};
use crate::domain::{
    CalculatedMetricRecord, CalculatedMetricUpsert, HistoricalMetricRecord, KpiDeltas,
    KpiSnapshot, MalformedStagingRecord, MarketId, Measurement, NewHistoricalMetric,
    NewStagingMetric, PendingStaging, ProviderId, StagingMetricRecord,
};
use crate::error::{Error, Result};
use crate::port::outbound::store::{MetricsStore, MetricsTransaction};

/// Render a timestamp so that lexical order matches chronological order.
fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Layout of SQLite's `datetime()` and `CURRENT_TIMESTAMP`, always UTC.
const SQLITE_DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

/// Parse RFC 3339, or the UTC form SQLite itself writes.
fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    if let Ok(at) = DateTime::parse_from_rfc3339(raw) {
        return Ok(at.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, SQLITE_DATETIME_FORMAT)
        .map(|at| at.and_utc())
        .map_err(|e| Error::Parse(format!("invalid timestamp {raw:?}: {e}")))
}

fn format_measurement(value: Measurement) -> Option<String> {
    value.value().map(|d| d.to_string())
}

fn parse_measurement(raw: Option<&str>) -> Result<Measurement> {
    raw.map(|s| {
        Decimal::from_str(s)
            .map(Measurement::Known)
            .map_err(|e| Error::Parse(format!("invalid decimal {s:?}: {e}")))
    })
    .transpose()
    .map(Option::unwrap_or_default)
}

/// KPI columns shared by every metrics table.
struct KpiColumns {
    care_requests_completed_last_seven_days: i64,
    average_net_promoter_score: Option<String>,
    chart_closure_rate: Option<String>,
    survey_capture_rate: Option<String>,
    median_on_scene_time_secs: Option<i32>,
    last_care_request_completed_at: Option<String>,
    completed_care_requests: i64,
}

impl KpiColumns {
    fn encode(kpis: &KpiSnapshot) -> Self {
        Self {
            care_requests_completed_last_seven_days: kpis.care_requests_completed_last_seven_days,
            average_net_promoter_score: format_measurement(kpis.average_net_promoter_score),
            chart_closure_rate: format_measurement(kpis.chart_closure_rate),
            survey_capture_rate: format_measurement(kpis.survey_capture_rate),
            median_on_scene_time_secs: kpis.median_on_scene_time_secs,
            last_care_request_completed_at: kpis
                .last_care_request_completed_at
                .map(format_timestamp),
            completed_care_requests: kpis.completed_care_requests,
        }
    }

    fn decode(self) -> Result<KpiSnapshot> {
        Ok(KpiSnapshot {
            care_requests_completed_last_seven_days: self.care_requests_completed_last_seven_days,
            average_net_promoter_score: parse_measurement(
                self.average_net_promoter_score.as_deref(),
            )?,
            chart_closure_rate: parse_measurement(self.chart_closure_rate.as_deref())?,
            survey_capture_rate: parse_measurement(self.survey_capture_rate.as_deref())?,
            median_on_scene_time_secs: self.median_on_scene_time_secs,
            last_care_request_completed_at: self
                .last_care_request_completed_at
                .as_deref()
                .map(parse_timestamp)
                .transpose()?,
            completed_care_requests: self.completed_care_requests,
        })
    }
}

fn pending_from_row(row: StagingRow) -> PendingStaging {
    let (id, provider_id) = (row.id, ProviderId::new(row.provider_id));
    staging_from_row(row).map_err(|e| MalformedStagingRecord {
        id,
        provider_id,
        reason: e.to_string(),
    })
}

fn staging_from_row(row: StagingRow) -> Result<StagingMetricRecord> {
    let kpis = KpiColumns {
        care_requests_completed_last_seven_days: row.care_requests_completed_last_seven_days,
        average_net_promoter_score: row.average_net_promoter_score,
        chart_closure_rate: row.chart_closure_rate,
        survey_capture_rate: row.survey_capture_rate,
        median_on_scene_time_secs: row.median_on_scene_time_secs,
        last_care_request_completed_at: row.last_care_request_completed_at,
        completed_care_requests: row.completed_care_requests,
    }
    .decode()?;

    Ok(StagingMetricRecord {
        id: row.id,
        provider_id: ProviderId::new(row.provider_id),
        kpis,
        market_ids: row.market_ids,
    })
}

fn historical_from_row(row: HistoricalRow) -> Result<HistoricalMetricRecord> {
    let created_at = parse_timestamp(&row.created_at)?;
    let kpis = KpiColumns {
        care_requests_completed_last_seven_days: row.care_requests_completed_last_seven_days,
        average_net_promoter_score: row.average_net_promoter_score,
        chart_closure_rate: row.chart_closure_rate,
        survey_capture_rate: row.survey_capture_rate,
        median_on_scene_time_secs: row.median_on_scene_time_secs,
        last_care_request_completed_at: row.last_care_request_completed_at,
        completed_care_requests: row.completed_care_requests,
    }
    .decode()?;

    Ok(HistoricalMetricRecord {
        id: row.id,
        provider_id: ProviderId::new(row.provider_id),
        kpis,
        created_at,
    })
}

fn calculated_from_row(row: CalculatedRow) -> Result<CalculatedMetricRecord> {
    let deltas = KpiDeltas {
        average_net_promoter_score_change: parse_measurement(
            row.average_net_promoter_score_change.as_deref(),
        )?,
        chart_closure_rate_change: parse_measurement(row.chart_closure_rate_change.as_deref())?,
        survey_capture_rate_change: parse_measurement(row.survey_capture_rate_change.as_deref())?,
        median_on_scene_time_secs_change: row.median_on_scene_time_secs_change,
    };
    let created_at = parse_timestamp(&row.created_at)?;
    let updated_at = parse_timestamp(&row.updated_at)?;
    let kpis = KpiColumns {
        care_requests_completed_last_seven_days: row.care_requests_completed_last_seven_days,
        average_net_promoter_score: row.average_net_promoter_score,
        chart_closure_rate: row.chart_closure_rate,
        survey_capture_rate: row.survey_capture_rate,
        median_on_scene_time_secs: row.median_on_scene_time_secs,
        last_care_request_completed_at: row.last_care_request_completed_at,
        completed_care_requests: row.completed_care_requests,
    }
    .decode()?;

    Ok(CalculatedMetricRecord {
        provider_id: ProviderId::new(row.provider_id),
        kpis,
        deltas,
        change_days: row.change_days,
        created_at,
        updated_at,
    })
}

fn calculated_to_row(metric: &CalculatedMetricUpsert) -> CalculatedRow {
    let kpis = KpiColumns::encode(&metric.kpis);
    let at = format_timestamp(metric.at);
    CalculatedRow {
        provider_id: metric.provider_id.get(),
        care_requests_completed_last_seven_days: kpis.care_requests_completed_last_seven_days,
        average_net_promoter_score: kpis.average_net_promoter_score,
        average_net_promoter_score_change: format_measurement(
            metric.deltas.average_net_promoter_score_change,
        ),
        chart_closure_rate: kpis.chart_closure_rate,
        chart_closure_rate_change: format_measurement(metric.deltas.chart_closure_rate_change),
        survey_capture_rate: kpis.survey_capture_rate,
        survey_capture_rate_change: format_measurement(metric.deltas.survey_capture_rate_change),
        median_on_scene_time_secs: kpis.median_on_scene_time_secs,
        median_on_scene_time_secs_change: metric.deltas.median_on_scene_time_secs_change,
        last_care_request_completed_at: kpis.last_care_request_completed_at,
        completed_care_requests: kpis.completed_care_requests,
        change_days: metric.change_days,
        created_at: at.clone(),
        updated_at: at,
    }
}

#[derive(QueryableByName)]
struct LastInsertRowId {
    #[diesel(sql_type = diesel::sql_types::BigInt)]
    #[diesel(column_name = "id")]
    id: i64,
}

fn last_insert_rowid(conn: &mut SqliteConnection) -> QueryResult<i64> {
    diesel::sql_query("SELECT last_insert_rowid() AS id")
        .get_result::<LastInsertRowId>(conn)
        .map(|row| row.id)
}

fn load_active_markets(
    conn: &mut SqliteConnection,
    provider_id: ProviderId,
) -> Result<Vec<MarketId>> {
    let ids: Vec<i64> = active_provider_markets::table
        .filter(active_provider_markets::provider_id.eq(provider_id.get()))
        .select(active_provider_markets::market_id)
        .order(active_provider_markets::market_id.asc())
        .load(conn)?;
    Ok(ids.into_iter().map(MarketId::new).collect())
}

fn load_calculated(
    conn: &mut SqliteConnection,
    provider_id: ProviderId,
) -> Result<Option<CalculatedMetricRecord>> {
    let row: Option<CalculatedRow> = calculated_provider_metrics::table
        .find(provider_id.get())
        .select(CalculatedRow::as_select())
        .first(conn)
        .optional()?;
    row.map(calculated_from_row).transpose()
}

/// Transaction handle over a single SQLite connection.
struct SqliteMetricsTransaction<'a> {
    conn: &'a mut SqliteConnection,
}

impl MetricsTransaction for SqliteMetricsTransaction<'_> {
    fn insert_historical(
        &mut self,
        metric: &NewHistoricalMetric,
    ) -> Result<HistoricalMetricRecord> {
        let kpis = KpiColumns::encode(&metric.kpis);
        let row = NewHistoricalRow {
            provider_id: metric.provider_id.get(),
            care_requests_completed_last_seven_days: kpis.care_requests_completed_last_seven_days,
            average_net_promoter_score: kpis.average_net_promoter_score,
            chart_closure_rate: kpis.chart_closure_rate,
            survey_capture_rate: kpis.survey_capture_rate,
            median_on_scene_time_secs: kpis.median_on_scene_time_secs,
            last_care_request_completed_at: kpis.last_care_request_completed_at,
            completed_care_requests: kpis.completed_care_requests,
            created_at: format_timestamp(metric.created_at),
        };

        diesel::insert_into(historical_provider_metrics::table)
            .values(&row)
            .execute(self.conn)?;
        let id = last_insert_rowid(self.conn)?;

        Ok(HistoricalMetricRecord {
            id,
            provider_id: metric.provider_id,
            kpis: metric.kpis.clone(),
            created_at: metric.created_at,
        })
    }

    fn oldest_historical_since(
        &mut self,
        provider_id: ProviderId,
        cutoff: DateTime<Utc>,
        exclude_id: i64,
    ) -> Result<Option<HistoricalMetricRecord>> {
        let row: Option<HistoricalRow> = historical_provider_metrics::table
            .filter(historical_provider_metrics::provider_id.eq(provider_id.get()))
            .filter(historical_provider_metrics::created_at.ge(format_timestamp(cutoff)))
            .filter(historical_provider_metrics::id.ne(exclude_id))
            .order((
                historical_provider_metrics::created_at.asc(),
                historical_provider_metrics::id.asc(),
            ))
            .select(HistoricalRow::as_select())
            .first(self.conn)
            .optional()?;

        row.map(historical_from_row).transpose()
    }

    fn upsert_calculated(
        &mut self,
        metric: &CalculatedMetricUpsert,
    ) -> Result<CalculatedMetricRecord> {
        let row = calculated_to_row(metric);
        let changes = CalculatedChangeset::from(&row);

        diesel::insert_into(calculated_provider_metrics::table)
            .values(&row)
            .on_conflict(calculated_provider_metrics::provider_id)
            .do_update()
            .set(&changes)
            .execute(self.conn)?;

        load_calculated(self.conn, metric.provider_id)?.ok_or_else(|| {
            Error::Database(format!(
                "calculated metrics for provider {} missing after upsert",
                metric.provider_id
            ))
        })
    }

    fn active_markets(&mut self, provider_id: ProviderId) -> Result<Vec<MarketId>> {
        load_active_markets(self.conn, provider_id)
    }

    fn add_active_markets(
        &mut self,
        provider_id: ProviderId,
        market_ids: &[MarketId],
    ) -> Result<()> {
        let rows: Vec<ActiveMarketRow> = market_ids
            .iter()
            .map(|market_id| ActiveMarketRow {
                provider_id: provider_id.get(),
                market_id: market_id.get(),
            })
            .collect();

        diesel::insert_into(active_provider_markets::table)
            .values(&rows)
            .execute(self.conn)?;
        Ok(())
    }

    fn remove_active_markets(
        &mut self,
        provider_id: ProviderId,
        market_ids: &[MarketId],
    ) -> Result<()> {
        let ids: Vec<i64> = market_ids.iter().map(|id| id.get()).collect();

        diesel::delete(
            active_provider_markets::table
                .filter(active_provider_markets::provider_id.eq(provider_id.get()))
                .filter(active_provider_markets::market_id.eq_any(ids)),
        )
        .execute(self.conn)?;
        Ok(())
    }

    fn delete_staging(&mut self, id: i64) -> Result<()> {
        let deleted = diesel::delete(staging_provider_metrics::table.find(id)).execute(self.conn)?;
        if deleted == 0 {
            return Err(Error::Database(format!("staging metric {id} not found")));
        }
        Ok(())
    }
}

/// SQLite-backed KPI metrics store.
///
/// Implements [`MetricsStore`] with one pooled connection per call and one
/// SQLite transaction per [`MetricsStore::in_transaction`].
#[derive(Clone)]
pub struct SqliteMetricsStore {
    /// Database connection pool.
    pool: DbPool,
}

impl SqliteMetricsStore {
    /// Create a new SQLite metrics store with the given connection pool.
    #[must_use]
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// The underlying connection pool.
    #[must_use]
    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

impl MetricsStore for SqliteMetricsStore {
    fn pending_staging(&self) -> Result<Vec<PendingStaging>> {
        let mut conn = self.pool.get()?;
        let rows: Vec<StagingRow> = staging_provider_metrics::table
            .order(staging_provider_metrics::id.asc())
            .select(StagingRow::as_select())
            .load(&mut conn)?;

        Ok(rows.into_iter().map(pending_from_row).collect())
    }

    fn in_transaction<T, F>(&self, work: F) -> Result<T>
    where
        F: FnOnce(&mut dyn MetricsTransaction) -> Result<T>,
    {
        let mut pooled = self.pool.get()?;
        let conn: &mut SqliteConnection = &mut pooled;
        conn.transaction(|conn| {
            let mut tx = SqliteMetricsTransaction { conn };
            work(&mut tx)
        })
    }

    fn add_staging(&self, metric: &NewStagingMetric) -> Result<StagingMetricRecord> {
        let kpis = KpiColumns::encode(&metric.kpis);
        let row = NewStagingRow {
            provider_id: metric.provider_id.get(),
            care_requests_completed_last_seven_days: kpis.care_requests_completed_last_seven_days,
            average_net_promoter_score: kpis.average_net_promoter_score,
            chart_closure_rate: kpis.chart_closure_rate,
            survey_capture_rate: kpis.survey_capture_rate,
            median_on_scene_time_secs: kpis.median_on_scene_time_secs,
            last_care_request_completed_at: kpis.last_care_request_completed_at,
            completed_care_requests: kpis.completed_care_requests,
            market_ids: metric.market_ids.clone(),
            created_at: format_timestamp(Utc::now()),
        };

        let mut pooled = self.pool.get()?;
        let conn: &mut SqliteConnection = &mut pooled;
        let id = conn.transaction(|conn| {
            diesel::insert_into(staging_provider_metrics::table)
                .values(&row)
                .execute(conn)?;
            last_insert_rowid(conn)
        })?;

        Ok(StagingMetricRecord {
            id,
            provider_id: metric.provider_id,
            kpis: metric.kpis.clone(),
            market_ids: metric.market_ids.clone(),
        })
    }

    fn delete_all_staging(&self) -> Result<usize> {
        let mut conn = self.pool.get()?;
        Ok(diesel::delete(staging_provider_metrics::table).execute(&mut conn)?)
    }

    fn calculated_for_provider(
        &self,
        provider_id: ProviderId,
    ) -> Result<Option<CalculatedMetricRecord>> {
        let mut conn = self.pool.get()?;
        load_calculated(&mut conn, provider_id)
    }

    fn calculated_active_after(
        &self,
        provider_ids: &[ProviderId],
        active_after: DateTime<Utc>,
    ) -> Result<Vec<CalculatedMetricRecord>> {
        let ids: Vec<i64> = provider_ids.iter().map(|id| id.get()).collect();
        let mut conn = self.pool.get()?;
        let rows: Vec<CalculatedRow> = calculated_provider_metrics::table
            .filter(calculated_provider_metrics::provider_id.eq_any(ids))
            .filter(
                calculated_provider_metrics::last_care_request_completed_at
                    .ge(format_timestamp(active_after)),
            )
            .order(calculated_provider_metrics::provider_id.asc())
            .select(CalculatedRow::as_select())
            .load(&mut conn)?;

        rows.into_iter().map(calculated_from_row).collect()
    }

    fn active_providers_for_market(&self, market_id: MarketId) -> Result<Vec<ProviderId>> {
        let mut conn = self.pool.get()?;
        let ids: Vec<i64> = active_provider_markets::table
            .filter(active_provider_markets::market_id.eq(market_id.get()))
            .select(active_provider_markets::provider_id)
            .order(active_provider_markets::provider_id.asc())
            .load(&mut conn)?;
        Ok(ids.into_iter().map(ProviderId::new).collect())
    }

    fn active_markets_for_provider(&self, provider_id: ProviderId) -> Result<Vec<MarketId>> {
        let mut conn = self.pool.get()?;
        load_active_markets(&mut conn, provider_id)
    }

    fn historical_for_provider(
        &self,
        provider_id: ProviderId,
    ) -> Result<Vec<HistoricalMetricRecord>> {
        let mut conn = self.pool.get()?;
        let rows: Vec<HistoricalRow> = historical_provider_metrics::table
            .filter(historical_provider_metrics::provider_id.eq(provider_id.get()))
            .order((
                historical_provider_metrics::created_at.asc(),
                historical_provider_metrics::id.asc(),
            ))
            .select(HistoricalRow::as_select())
            .load(&mut conn)?;

        rows.into_iter().map(historical_from_row).collect()
    }
}
