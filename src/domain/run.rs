//! Per-run and per-record reconciliation results.

use std::time::Duration;

use super::id::ProviderId;

/// Counters for a single reconciliation run. Reported, never persisted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunMetrics {
    pub duration: Duration,
    /// Staging rows fetched at the start of the run.
    pub staging_record_count: usize,
    pub market_id_parse_error_count: usize,
    pub transaction_error_count: usize,
}

impl RunMetrics {
    /// Fold one record's outcome into the run totals.
    ///
    /// Parse errors count once market reconciliation was reached, even if
    /// a later step rolled the record back.
    pub fn record(&mut self, outcome: &RecordOutcome) {
        self.market_id_parse_error_count += outcome.market_id_parse_errors();
        if outcome.is_rolled_back() {
            self.transaction_error_count += 1;
        }
    }
}

/// Reconciliation step that failed for a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordStep {
    /// Reading the staging row's stored values.
    Decode,
    InsertHistorical,
    FindBaseline,
    UpsertCalculated,
    ReconcileMarkets,
    DeleteStaging,
    /// Opening or committing the transaction itself.
    Transaction,
}

impl RecordStep {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Decode => "decode_staging",
            Self::InsertHistorical => "insert_historical",
            Self::FindBaseline => "find_baseline",
            Self::UpsertCalculated => "upsert_calculated",
            Self::ReconcileMarkets => "reconcile_markets",
            Self::DeleteStaging => "delete_staging",
            Self::Transaction => "transaction",
        }
    }
}

impl std::fmt::Display for RecordStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal state of one staging record within a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordOutcome {
    /// Deltas computed, calculated row upserted, markets reconciled, staging
    /// row deleted.
    Reconciled {
        provider_id: ProviderId,
        market_id_parse_errors: usize,
    },
    /// No baseline in the window: historical snapshot kept, markets
    /// reconciled and staging row deleted, but no calculated row written.
    NoBaseline {
        provider_id: ProviderId,
        market_id_parse_errors: usize,
    },
    /// A step failed and the record's transaction was rolled back. The
    /// staging row remains for the next run.
    RolledBack {
        provider_id: ProviderId,
        step: RecordStep,
        reason: String,
        /// Zero unless the failure came at or after market reconciliation.
        market_id_parse_errors: usize,
    },
}

impl RecordOutcome {
    #[must_use]
    pub const fn provider_id(&self) -> ProviderId {
        match self {
            Self::Reconciled { provider_id, .. }
            | Self::NoBaseline { provider_id, .. }
            | Self::RolledBack { provider_id, .. } => *provider_id,
        }
    }

    #[must_use]
    pub const fn market_id_parse_errors(&self) -> usize {
        match self {
            Self::Reconciled {
                market_id_parse_errors,
                ..
            }
            | Self::NoBaseline {
                market_id_parse_errors,
                ..
            }
            | Self::RolledBack {
                market_id_parse_errors,
                ..
            } => *market_id_parse_errors,
        }
    }

    #[must_use]
    pub const fn is_rolled_back(&self) -> bool {
        matches!(self, Self::RolledBack { .. })
    }
}
