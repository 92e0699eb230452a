//! Handlers for the `provider` and `market` commands.

use serde_json::json;
use tabled::{Table, Tabled};

use crate::adapter::inbound::cli::command::{MarketArgs, ProviderArgs};
use crate::adapter::inbound::cli::output;
use crate::application::query::ProviderMetricsView;
use crate::domain::{MarketId, Measurement, ProviderId};
use crate::error::Result;
use crate::infrastructure::bootstrap;
use crate::infrastructure::config::settings::Config;

#[derive(Tabled)]
struct ProviderRow {
    #[tabled(rename = "Provider")]
    provider: i64,
    #[tabled(rename = "Completed")]
    completed: i64,
    #[tabled(rename = "Last 7d")]
    last_seven_days: i64,
    #[tabled(rename = "NPS")]
    nps: String,
    #[tabled(rename = "Chart Closure")]
    chart_closure: String,
    #[tabled(rename = "Survey Capture")]
    survey_capture: String,
    #[tabled(rename = "On Scene (s)")]
    on_scene: String,
}

fn measurement(value: Measurement, change: Measurement) -> String {
    match (value, change) {
        (Measurement::Known(v), Measurement::Known(c)) => format!("{v} ({c:+})"),
        (Measurement::Known(v), Measurement::Unknown) => v.to_string(),
        (Measurement::Unknown, _) => "-".to_string(),
    }
}

fn seconds(value: Option<i32>, change: Option<i32>) -> String {
    match (value, change) {
        (Some(v), Some(c)) => format!("{v} ({c:+})"),
        (Some(v), None) => v.to_string(),
        (None, _) => "-".to_string(),
    }
}

impl From<&ProviderMetricsView> for ProviderRow {
    fn from(view: &ProviderMetricsView) -> Self {
        let withheld = || "withheld".to_string();
        let (nps, chart_closure, survey_capture, on_scene) = match &view.kpis {
            Some(k) => (
                measurement(
                    k.average_net_promoter_score,
                    k.changes.average_net_promoter_score_change,
                ),
                measurement(k.chart_closure_rate, k.changes.chart_closure_rate_change),
                measurement(k.survey_capture_rate, k.changes.survey_capture_rate_change),
                seconds(k.median_on_scene_time_secs, k.changes.median_on_scene_time_secs_change),
            ),
            None => (withheld(), withheld(), withheld(), withheld()),
        };

        Self {
            provider: view.provider_id.get(),
            completed: view.completed_care_requests,
            last_seven_days: view.care_requests_completed_last_seven_days,
            nps,
            chart_closure,
            survey_capture,
            on_scene,
        }
    }
}

/// Execute the `provider` command.
pub fn execute_provider(config: &Config, args: &ProviderArgs) -> Result<()> {
    let store = bootstrap::open_store(config)?;
    let query = bootstrap::build_query(config, store);
    let view = query.latest_for_provider(ProviderId::new(args.provider_id))?;

    if output::is_json() {
        output::json_output(json!({
            "command": "provider",
            "provider_id": args.provider_id,
            "metrics": serde_json::to_value(&view)?,
        }));
        return Ok(());
    }

    let Some(view) = view else {
        output::warning(&format!("No calculated metrics for provider {}", args.provider_id));
        return Ok(());
    };

    output::section(&format!("Provider {}", view.provider_id));
    output::field("Completed care requests", view.completed_care_requests);
    output::field("Last seven days", view.care_requests_completed_last_seven_days);
    if let Some(at) = view.last_care_request_completed_at {
        output::field("Last completed", at.to_rfc3339());
    }
    output::field("Updated", view.updated_at.to_rfc3339());

    match &view.kpis {
        Some(k) => {
            output::field("Change window", format!("{} days", k.change_days));
            output::field(
                "Net promoter score",
                measurement(
                    k.average_net_promoter_score,
                    k.changes.average_net_promoter_score_change,
                ),
            );
            output::field(
                "Chart closure rate",
                measurement(k.chart_closure_rate, k.changes.chart_closure_rate_change),
            );
            output::field(
                "Survey capture rate",
                measurement(k.survey_capture_rate, k.changes.survey_capture_rate_change),
            );
            output::field(
                "Median on-scene time (s)",
                seconds(k.median_on_scene_time_secs, k.changes.median_on_scene_time_secs_change),
            );
        }
        None => output::note("Not enough completed care requests to show KPIs"),
    }
    Ok(())
}

/// Execute the `market` command.
pub fn execute_market(config: &Config, args: &MarketArgs) -> Result<()> {
    let active_within_days = args
        .active_within_days
        .unwrap_or(config.query.active_within_days);
    let store = bootstrap::open_store(config)?;
    let query = bootstrap::build_query(config, store);
    let views = query.latest_for_market(
        MarketId::new(args.market_id),
        active_within_days,
        chrono::Utc::now(),
    )?;

    if output::is_json() {
        output::json_output(json!({
            "command": "market",
            "market_id": args.market_id,
            "active_within_days": active_within_days,
            "providers": serde_json::to_value(&views)?,
        }));
        return Ok(());
    }

    output::section(&format!("Market {}", args.market_id));
    if views.is_empty() {
        output::note(&format!(
            "No providers active within the last {active_within_days} days"
        ));
        return Ok(());
    }

    let rows: Vec<ProviderRow> = views.iter().map(ProviderRow::from).collect();
    output::lines(&Table::new(rows).to_string());
    Ok(())
}
