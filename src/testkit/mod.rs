//! Shared test utilities available to both unit and integration tests.
//!
//! Enabled via `#[cfg(test)]` (unit tests) or the `testkit` feature
//! (integration tests).
//!
//! # Modules
//!
//! - [`store`] - In-memory [`MetricsStore`](crate::port::MetricsStore) with
//!   failure injection.
//! - [`metrics`] - Recording [`MetricsSink`](crate::port::MetricsSink).
//! - [`domain`] - Builders for KPI snapshots and records.

pub mod domain;
pub mod metrics;
pub mod store;
