//! In-memory [`MetricsStore`] with per-provider failure injection.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use crate::domain::{
    CalculatedMetricRecord, CalculatedMetricUpsert, HistoricalMetricRecord,
    MalformedStagingRecord, MarketId, NewHistoricalMetric, NewStagingMetric, PendingStaging,
    ProviderId, StagingMetricRecord,
};
use crate::error::{Error, Result};
use crate::port::outbound::store::{MetricsStore, MetricsTransaction};

/// Transaction operation that can be made to fail for one provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailAt {
    InsertHistorical,
    FindBaseline,
    UpsertCalculated,
    ActiveMarkets,
    AddActiveMarkets,
    RemoveActiveMarkets,
    DeleteStaging,
}

#[derive(Debug, Clone, Default)]
struct MemoryState {
    staging: BTreeMap<i64, PendingStaging>,
    historical: Vec<HistoricalMetricRecord>,
    calculated: BTreeMap<ProviderId, CalculatedMetricRecord>,
    memberships: BTreeSet<(ProviderId, MarketId)>,
    next_staging_id: i64,
    next_historical_id: i64,
}

/// In-memory store for testing purposes.
///
/// Transactions run against a copy of the state that replaces the original
/// only when the work returns `Ok`.
#[derive(Debug, Default)]
pub struct MemoryMetricsStore {
    state: RwLock<MemoryState>,
    failures: RwLock<HashSet<(ProviderId, FailAt)>>,
    fail_pending: AtomicBool,
    transactions: AtomicUsize,
}

impl MemoryMetricsStore {
    /// Create a new empty memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `step` fail for every transaction touching `provider_id`.
    pub fn fail_at(&self, provider_id: ProviderId, step: FailAt) {
        self.failures.write().insert((provider_id, step));
    }

    /// Make [`MetricsStore::pending_staging`] fail.
    pub fn fail_pending_staging(&self) {
        self.fail_pending.store(true, Ordering::SeqCst);
    }

    /// Stage a row that [`MetricsStore::pending_staging`] reports as
    /// undecodable. Returns its id.
    pub fn add_malformed_staging(&self, provider_id: ProviderId, reason: &str) -> i64 {
        let mut state = self.state.write();
        state.next_staging_id += 1;
        let id = state.next_staging_id;
        let malformed = MalformedStagingRecord {
            id,
            provider_id,
            reason: reason.to_string(),
        };
        state.staging.insert(id, Err(malformed));
        id
    }

    /// Number of transactions opened so far.
    pub fn transaction_count(&self) -> usize {
        self.transactions.load(Ordering::SeqCst)
    }

    /// Insert a historical snapshot outside of any reconciliation run.
    pub fn seed_historical(&self, metric: &NewHistoricalMetric) -> HistoricalMetricRecord {
        insert_historical(&mut self.state.write(), metric)
    }

    /// Mark the provider active in `market_ids`.
    pub fn seed_active_markets(&self, provider_id: ProviderId, market_ids: &[MarketId]) {
        let mut state = self.state.write();
        for market_id in market_ids {
            state.memberships.insert((provider_id, *market_id));
        }
    }

    /// All calculated rows, ordered by provider.
    pub fn calculated(&self) -> Vec<CalculatedMetricRecord> {
        self.state.read().calculated.values().cloned().collect()
    }
}

fn insert_historical(
    state: &mut MemoryState,
    metric: &NewHistoricalMetric,
) -> HistoricalMetricRecord {
    state.next_historical_id += 1;
    let record = HistoricalMetricRecord {
        id: state.next_historical_id,
        provider_id: metric.provider_id,
        kpis: metric.kpis.clone(),
        created_at: metric.created_at,
    };
    state.historical.push(record.clone());
    record
}

fn markets_of(state: &MemoryState, provider_id: ProviderId) -> Vec<MarketId> {
    state
        .memberships
        .iter()
        .filter(|(p, _)| *p == provider_id)
        .map(|(_, m)| *m)
        .collect()
}

struct MemoryTransaction<'a> {
    state: &'a mut MemoryState,
    failures: &'a HashSet<(ProviderId, FailAt)>,
}

impl MemoryTransaction<'_> {
    fn check(&self, provider_id: ProviderId, step: FailAt) -> Result<()> {
        if self.failures.contains(&(provider_id, step)) {
            return Err(Error::Database(format!(
                "injected {step:?} failure for provider {provider_id}"
            )));
        }
        Ok(())
    }
}

impl MetricsTransaction for MemoryTransaction<'_> {
    fn insert_historical(
        &mut self,
        metric: &NewHistoricalMetric,
    ) -> Result<HistoricalMetricRecord> {
        self.check(metric.provider_id, FailAt::InsertHistorical)?;
        Ok(insert_historical(self.state, metric))
    }

    fn oldest_historical_since(
        &mut self,
        provider_id: ProviderId,
        cutoff: DateTime<Utc>,
        exclude_id: i64,
    ) -> Result<Option<HistoricalMetricRecord>> {
        self.check(provider_id, FailAt::FindBaseline)?;
        Ok(self
            .state
            .historical
            .iter()
            .filter(|h| {
                h.provider_id == provider_id && h.created_at >= cutoff && h.id != exclude_id
            })
            .min_by_key(|h| (h.created_at, h.id))
            .cloned())
    }

    fn upsert_calculated(
        &mut self,
        metric: &CalculatedMetricUpsert,
    ) -> Result<CalculatedMetricRecord> {
        self.check(metric.provider_id, FailAt::UpsertCalculated)?;
        let created_at = self
            .state
            .calculated
            .get(&metric.provider_id)
            .map_or(metric.at, |existing| existing.created_at);
        let record = CalculatedMetricRecord {
            provider_id: metric.provider_id,
            kpis: metric.kpis.clone(),
            deltas: metric.deltas,
            change_days: metric.change_days,
            created_at,
            updated_at: metric.at,
        };
        self.state.calculated.insert(metric.provider_id, record.clone());
        Ok(record)
    }

    fn active_markets(&mut self, provider_id: ProviderId) -> Result<Vec<MarketId>> {
        self.check(provider_id, FailAt::ActiveMarkets)?;
        Ok(markets_of(self.state, provider_id))
    }

    fn add_active_markets(
        &mut self,
        provider_id: ProviderId,
        market_ids: &[MarketId],
    ) -> Result<()> {
        self.check(provider_id, FailAt::AddActiveMarkets)?;
        for market_id in market_ids {
            if !self.state.memberships.insert((provider_id, *market_id)) {
                return Err(Error::Database(format!(
                    "membership ({provider_id}, {market_id}) already exists"
                )));
            }
        }
        Ok(())
    }

    fn remove_active_markets(
        &mut self,
        provider_id: ProviderId,
        market_ids: &[MarketId],
    ) -> Result<()> {
        self.check(provider_id, FailAt::RemoveActiveMarkets)?;
        for market_id in market_ids {
            self.state.memberships.remove(&(provider_id, *market_id));
        }
        Ok(())
    }

    fn delete_staging(&mut self, id: i64) -> Result<()> {
        let provider_id = self
            .state
            .staging
            .get(&id)
            .map(|s| match s {
                Ok(staging) => staging.provider_id,
                Err(malformed) => malformed.provider_id,
            })
            .ok_or_else(|| Error::Database(format!("staging metric {id} not found")))?;
        self.check(provider_id, FailAt::DeleteStaging)?;
        self.state.staging.remove(&id);
        Ok(())
    }
}

impl MetricsStore for MemoryMetricsStore {
    fn pending_staging(&self) -> Result<Vec<PendingStaging>> {
        if self.fail_pending.load(Ordering::SeqCst) {
            return Err(Error::Connection("injected staging fetch failure".into()));
        }
        Ok(self.state.read().staging.values().cloned().collect())
    }

    fn in_transaction<T, F>(&self, work: F) -> Result<T>
    where
        F: FnOnce(&mut dyn MetricsTransaction) -> Result<T>,
    {
        self.transactions.fetch_add(1, Ordering::SeqCst);
        let failures = self.failures.read();
        let mut state = self.state.write();
        let mut working = state.clone();

        let value = work(&mut MemoryTransaction {
            state: &mut working,
            failures: &failures,
        })?;
        *state = working;
        Ok(value)
    }

    fn add_staging(&self, metric: &NewStagingMetric) -> Result<StagingMetricRecord> {
        let mut state = self.state.write();
        state.next_staging_id += 1;
        let record = StagingMetricRecord {
            id: state.next_staging_id,
            provider_id: metric.provider_id,
            kpis: metric.kpis.clone(),
            market_ids: metric.market_ids.clone(),
        };
        state.staging.insert(record.id, Ok(record.clone()));
        Ok(record)
    }

    fn delete_all_staging(&self) -> Result<usize> {
        let mut state = self.state.write();
        let count = state.staging.len();
        state.staging.clear();
        Ok(count)
    }

    fn calculated_for_provider(
        &self,
        provider_id: ProviderId,
    ) -> Result<Option<CalculatedMetricRecord>> {
        Ok(self.state.read().calculated.get(&provider_id).cloned())
    }

    fn calculated_active_after(
        &self,
        provider_ids: &[ProviderId],
        active_after: DateTime<Utc>,
    ) -> Result<Vec<CalculatedMetricRecord>> {
        let state = self.state.read();
        Ok(state
            .calculated
            .values()
            .filter(|c| provider_ids.contains(&c.provider_id))
            .filter(|c| {
                c.kpis
                    .last_care_request_completed_at
                    .is_some_and(|at| at >= active_after)
            })
            .cloned()
            .collect())
    }

    fn active_providers_for_market(&self, market_id: MarketId) -> Result<Vec<ProviderId>> {
        let state = self.state.read();
        let providers: BTreeSet<ProviderId> = state
            .memberships
            .iter()
            .filter(|(_, m)| *m == market_id)
            .map(|(p, _)| *p)
            .collect();
        Ok(providers.into_iter().collect())
    }

    fn active_markets_for_provider(&self, provider_id: ProviderId) -> Result<Vec<MarketId>> {
        Ok(markets_of(&self.state.read(), provider_id))
    }

    fn historical_for_provider(
        &self,
        provider_id: ProviderId,
    ) -> Result<Vec<HistoricalMetricRecord>> {
        let mut records: Vec<HistoricalMetricRecord> = self
            .state
            .read()
            .historical
            .iter()
            .filter(|h| h.provider_id == provider_id)
            .cloned()
            .collect();
        records.sort_by_key(|h| (h.created_at, h.id));
        Ok(records)
    }
}
