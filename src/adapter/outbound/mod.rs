//! Outbound adapters (driven side).

pub mod metrics;
pub mod sqlite;
