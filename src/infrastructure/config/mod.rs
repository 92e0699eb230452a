//! Infrastructure configuration modules.

pub mod logging;
pub mod metrics;
pub mod settings;

pub use settings::Config;
