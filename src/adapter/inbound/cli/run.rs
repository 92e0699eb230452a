//! Handler for the `run` command.

use std::sync::atomic::Ordering;

use serde_json::json;
use tokio::signal;
use tracing::{info, warn};

use crate::adapter::inbound::cli::command::RunArgs;
use crate::adapter::inbound::cli::output;
use crate::domain::RunMetrics;
use crate::error::{Error, Result};
use crate::infrastructure::bootstrap;
use crate::infrastructure::config::settings::Config;

/// Execute the run command.
///
/// The reconciliation loop runs on a blocking thread. Ctrl-C stops it before
/// the next record; records already committed stay committed.
pub async fn execute(mut config: Config, args: &RunArgs) -> Result<()> {
    if let Some(change_days) = args.change_days {
        config.reconcile.change_days = change_days;
        config.validate()?;
    }

    let store = bootstrap::open_store(&config)?;
    let reconciler = bootstrap::build_reconciler(&config, store);
    let cancel = reconciler.cancel_flag();

    let shutdown = tokio::spawn(async move {
        if signal::ctrl_c().await.is_ok() {
            warn!("Shutdown signal received, finishing current record");
            cancel.store(true, Ordering::SeqCst);
        }
    });

    let result = tokio::task::spawn_blocking(move || reconciler.run())
        .await
        .map_err(|e| Error::Task(e.to_string()))?;
    shutdown.abort();

    let metrics = result?;
    info!("Reconciliation run complete");
    print_metrics(&metrics);
    Ok(())
}

fn print_metrics(metrics: &RunMetrics) {
    if output::is_json() {
        output::json_output(json!({
            "command": "run",
            "duration_ms": metrics.duration.as_millis() as u64,
            "staging_record_count": metrics.staging_record_count,
            "market_id_parse_error_count": metrics.market_id_parse_error_count,
            "transaction_error_count": metrics.transaction_error_count,
        }));
        return;
    }

    output::section("Reconciliation");
    output::field("Staging records", metrics.staging_record_count);
    output::field("Market id parse errors", metrics.market_id_parse_error_count);
    output::field("Transaction errors", metrics.transaction_error_count);
    output::field("Duration", format!("{} ms", metrics.duration.as_millis()));

    if metrics.transaction_error_count > 0 {
        output::warning("Some records were rolled back and remain staged");
    } else {
        output::success("All staging records reconciled");
    }
}
