//! Staging-to-calculated metrics reconciliation.
//!
//! - [`orchestrator`] - Per-record transactional loop over staging rows.
//! - [`markets`] - Active-market membership diffing for one provider.
//! - [`config`] - Delta window configuration.

pub mod config;
pub mod markets;
pub mod orchestrator;

pub use config::ReconcileConfig;
pub use markets::reconcile_active_markets;
pub use orchestrator::Reconciler;
