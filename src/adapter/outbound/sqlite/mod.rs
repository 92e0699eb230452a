//! SQLite persistence adapters.
//!
//! Provides the SQLite-backed [`MetricsStore`](crate::port::MetricsStore)
//! for staging, historical, and calculated provider metrics using Diesel ORM.

pub mod database;
pub mod store;

pub use store::SqliteMetricsStore;
