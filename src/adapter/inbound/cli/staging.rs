//! Handler for the `staging` command group.

use serde_json::json;

use crate::adapter::inbound::cli::output;
use crate::error::Result;
use crate::infrastructure::bootstrap;
use crate::infrastructure::config::settings::Config;
use crate::port::outbound::store::MetricsStore;

/// Execute `staging clear`.
pub fn execute_clear(config: &Config) -> Result<()> {
    let store = bootstrap::open_store(config)?;
    let deleted = store.delete_all_staging()?;

    if output::is_json() {
        output::json_output(json!({
            "command": "staging.clear",
            "deleted": deleted,
        }));
        return Ok(());
    }

    output::success(&format!("Deleted {deleted} staging record(s)"));
    Ok(())
}
