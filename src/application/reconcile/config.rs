//! Reconciliation configuration.

use serde::{Deserialize, Serialize};

/// Configuration for the staging-to-calculated reconciliation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct ReconcileConfig {
    /// Length of the delta window in days. The baseline is the oldest
    /// historical snapshot taken on or after UTC midnight this many days ago.
    #[serde(default = "default_change_days")]
    pub change_days: i32,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            change_days: default_change_days(),
        }
    }
}

const fn default_change_days() -> i32 {
    7
}
