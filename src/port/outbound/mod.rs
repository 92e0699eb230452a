//! Outbound ports (driven side): interfaces implemented by outbound adapters.
//!
//! These contracts describe infrastructure dependencies: KPI record storage
//! and the metrics backend.

pub mod metrics;
pub mod store;
