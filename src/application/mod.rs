//! Application services (use cases).
//!
//! These services orchestrate domain logic and coordinate adapters
//! to implement the application's use cases.

pub mod query;
pub mod reconcile;
pub mod reporter;

pub use query::{LatestMetricsQuery, ProviderMetricsView, QueryConfig};
pub use reconcile::{ReconcileConfig, Reconciler};
pub use reporter::RunReporter;
