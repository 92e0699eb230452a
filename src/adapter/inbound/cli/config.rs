//! Handler for the `config` command group.

use std::path::Path;

use serde_json::json;

use crate::adapter::inbound::cli::output;
use crate::error::Result;
use crate::infrastructure::config::settings::Config;

/// Execute `config show`.
pub fn execute_show(config: &Config) -> Result<()> {
    if output::is_json() {
        output::json_output(json!({
            "command": "config.show",
            "config": serde_json::to_value(config)?,
        }));
        return Ok(());
    }

    output::section("Effective Configuration");
    output::lines(&config.to_toml()?);
    Ok(())
}

/// Execute `config validate`.
///
/// Unlike other commands, a missing configuration file is an error here.
pub fn execute_validate(path: &Path, database: Option<String>) -> Result<()> {
    let mut config = Config::load(path)?;
    config.override_database(database);
    config.validate()?;

    if output::is_json() {
        output::json_output(json!({
            "command": "config.validate",
            "path": path.display().to_string(),
            "valid": true,
        }));
        return Ok(());
    }

    output::success("Configuration is valid");
    output::field("Path", path.display());
    Ok(())
}
