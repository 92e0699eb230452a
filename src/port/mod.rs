//! Trait definitions (hexagonal ports). Depend only on domain.
//!
//! Ports define the extension points in the hexagonal architecture.
//! They are traits that adapters implement to integrate with external
//! systems.
//!
//! # Architecture
//!
//! ```text
//!                    ┌─────────────────────────┐
//!                    │      Application        │
//!                    │  (reconcile, query)     │
//!                    └───────────┬─────────────┘
//!                                │
//!                 ┌──────────────┴──────────────┐
//!                 ▼                             ▼
//!          ┌─────────────┐              ┌─────────────┐
//!          │   Store     │              │  Metrics    │
//!          │   Adapter   │              │  Adapter    │
//!          └─────────────┘              └─────────────┘
//! ```
//!
//! # Available Ports
//!
//! - [`MetricsStore`], [`MetricsTransaction`] - KPI record persistence
//! - [`MetricsSink`] - Run metrics emission

pub mod outbound;

pub use outbound::metrics::MetricsSink;
pub use outbound::store::{MetricsStore, MetricsTransaction};
