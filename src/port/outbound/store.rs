//! Persistence ports for provider KPI records.

use chrono::{DateTime, Utc};

use crate::domain::{
    CalculatedMetricRecord, CalculatedMetricUpsert, HistoricalMetricRecord, MarketId,
    NewHistoricalMetric, NewStagingMetric, PendingStaging, ProviderId, StagingMetricRecord,
};
use crate::error::Result;

/// Operations available inside a single atomic transaction.
///
/// Everything done through one `MetricsTransaction` commits or rolls back
/// together; see [`MetricsStore::in_transaction`].
pub trait MetricsTransaction {
    /// Append a historical snapshot.
    fn insert_historical(&mut self, metric: &NewHistoricalMetric)
        -> Result<HistoricalMetricRecord>;

    /// Oldest snapshot for the provider created at or after `cutoff`,
    /// ignoring the snapshot with id `exclude_id`.
    fn oldest_historical_since(
        &mut self,
        provider_id: ProviderId,
        cutoff: DateTime<Utc>,
        exclude_id: i64,
    ) -> Result<Option<HistoricalMetricRecord>>;

    /// Insert or replace the provider's calculated row.
    fn upsert_calculated(&mut self, metric: &CalculatedMetricUpsert)
        -> Result<CalculatedMetricRecord>;

    /// Markets the provider is currently active in.
    fn active_markets(&mut self, provider_id: ProviderId) -> Result<Vec<MarketId>>;

    fn add_active_markets(&mut self, provider_id: ProviderId, market_ids: &[MarketId])
        -> Result<()>;

    fn remove_active_markets(
        &mut self,
        provider_id: ProviderId,
        market_ids: &[MarketId],
    ) -> Result<()>;

    /// Delete a processed staging row.
    fn delete_staging(&mut self, id: i64) -> Result<()>;
}

/// Storage for staging, historical, calculated, and membership records.
pub trait MetricsStore: Send + Sync {
    /// All staging rows awaiting reconciliation, oldest first.
    ///
    /// A row whose values cannot be decoded comes back as an `Err` entry
    /// instead of failing the whole fetch.
    fn pending_staging(&self) -> Result<Vec<PendingStaging>>;

    /// Run `work` in one transaction. The transaction commits if `work`
    /// returns `Ok` and rolls back otherwise.
    fn in_transaction<T, F>(&self, work: F) -> Result<T>
    where
        F: FnOnce(&mut dyn MetricsTransaction) -> Result<T>;

    /// Write a staging row on behalf of a producer.
    fn add_staging(&self, metric: &NewStagingMetric) -> Result<StagingMetricRecord>;

    /// Delete every staging row. Returns the number deleted.
    fn delete_all_staging(&self) -> Result<usize>;

    fn calculated_for_provider(
        &self,
        provider_id: ProviderId,
    ) -> Result<Option<CalculatedMetricRecord>>;

    /// Calculated rows of the given providers whose last completed care
    /// request is at or after `active_after`.
    fn calculated_active_after(
        &self,
        provider_ids: &[ProviderId],
        active_after: DateTime<Utc>,
    ) -> Result<Vec<CalculatedMetricRecord>>;

    fn active_providers_for_market(&self, market_id: MarketId) -> Result<Vec<ProviderId>>;

    fn active_markets_for_provider(&self, provider_id: ProviderId) -> Result<Vec<MarketId>>;

    /// Historical snapshots for a provider, oldest first.
    fn historical_for_provider(&self, provider_id: ProviderId)
        -> Result<Vec<HistoricalMetricRecord>>;
}
