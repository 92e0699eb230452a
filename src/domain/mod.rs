//! Storage-agnostic domain types for provider KPI reconciliation.

pub mod id;
pub mod market;
pub mod measurement;
pub mod metric;
pub mod run;

pub use id::{MarketId, ProviderId};
pub use market::{parse_market_ids, MarketIdParseError, MarketSetDelta};
pub use measurement::Measurement;
pub use metric::{
    CalculatedMetricRecord, CalculatedMetricUpsert, HistoricalMetricRecord, KpiDeltas,
    KpiSnapshot, MalformedStagingRecord, NewHistoricalMetric, NewStagingMetric, PendingStaging,
    StagingMetricRecord,
};
pub use run::{RecordOutcome, RecordStep, RunMetrics};
