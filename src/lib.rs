//! Clinical KPI - staging-to-calculated provider metrics reconciliation.
//!
//! Upstream jobs write freshly computed provider KPIs into a staging table.
//! A reconciliation run turns every staging row into an immutable historical
//! snapshot, computes changes against the oldest snapshot in the delta
//! window, replaces the provider's calculated metrics, and brings the
//! provider's active-market memberships in line with the staged market list.
//! Each row is reconciled in its own transaction, so one bad row never blocks
//! the rest of the batch.
//!
//! # Architecture
//!
//! The crate follows a hexagonal layout:
//!
//! - **`domain`** - Storage-agnostic types: KPI records, measurements and
//!   deltas, market id parsing, run metrics
//! - **`port`** - Traits for persistence and metrics emission
//! - **`application`** - Reconciliation orchestrator, run reporter, and
//!   latest-metrics queries
//! - **`adapter`** - SQLite store (Diesel), `metrics` facade sink, CLI
//! - **`infrastructure`** - Configuration and runtime wiring
//!
//! # Features
//!
//! - `testkit` - In-memory store, recording metrics sink, and record
//!   builders for integration tests
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use clinical_kpi::adapter::outbound::sqlite::database::connection::{
//!     create_pool, run_migrations,
//! };
//! use clinical_kpi::adapter::outbound::sqlite::SqliteMetricsStore;
//! use clinical_kpi::application::{ReconcileConfig, Reconciler, RunReporter};
//!
//! fn main() -> clinical_kpi::error::Result<()> {
//!     let pool = create_pool("clinical_kpi.db")?;
//!     run_migrations(&pool)?;
//!     let store = Arc::new(SqliteMetricsStore::new(pool));
//!
//!     let config = ReconcileConfig::default();
//!     let reconciler = Reconciler::new(store, config, RunReporter::disabled());
//!     let metrics = reconciler.run()?;
//!     println!("{} staging records processed", metrics.staging_record_count);
//!     Ok(())
//! }
//! ```

pub mod adapter;
pub mod application;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod port;

#[cfg(any(test, feature = "testkit"))]
pub mod testkit;
