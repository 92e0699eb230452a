//! Command-line interface definitions.
//!
//! Defines the CLI structure for the clinical-kpi application using `clap`.
//! The CLI runs reconciliation, reads the latest provider and market metrics,
//! manages staging rows, and inspects configuration.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Provider KPI reconciliation CLI
#[derive(Parser, Debug)]
#[command(name = "clinical-kpi")]
#[command(version)]
pub struct Cli {
    /// Path to the configuration file
    #[arg(short, long, global = true, default_value = "config.toml")]
    pub config: PathBuf,

    /// Path to the SQLite database (overrides the configuration)
    #[arg(long, global = true)]
    pub database: Option<PathBuf>,

    /// JSON output for scripting
    #[arg(long, global = true)]
    pub json: bool,

    /// Decrease output verbosity
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands for the clinical-kpi CLI.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Reconcile all pending staging metrics
    Run(RunArgs),

    /// Show the latest metrics of a provider
    Provider(ProviderArgs),

    /// Show the latest metrics of a market's active providers
    Market(MarketArgs),

    /// Manage staging metrics
    #[command(subcommand)]
    Staging(StagingCommand),

    /// Inspect configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

/// Arguments for the `run` subcommand.
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Delta window in days (overrides `reconcile.change_days`)
    #[arg(long)]
    pub change_days: Option<i32>,
}

/// Arguments for the `provider` subcommand.
#[derive(Parser, Debug)]
pub struct ProviderArgs {
    /// Provider identifier
    pub provider_id: i64,
}

/// Arguments for the `market` subcommand.
#[derive(Parser, Debug)]
pub struct MarketArgs {
    /// Market identifier
    pub market_id: i64,

    /// Only include providers with a care request completed within this
    /// many days (overrides `query.active_within_days`)
    #[arg(long)]
    pub active_within_days: Option<i32>,
}

/// Subcommands for `clinical-kpi staging`.
#[derive(Subcommand, Debug)]
pub enum StagingCommand {
    /// Delete every pending staging row.
    Clear,
}

/// Subcommands for `clinical-kpi config`.
#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Display the effective configuration with defaults applied.
    Show,
    /// Validate the configuration file for correctness.
    Validate,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn global_flags_apply_to_subcommands() {
        let cli = Cli::parse_from([
            "clinical-kpi",
            "provider",
            "42",
            "--json",
            "--database",
            "/tmp/kpi.db",
        ]);

        assert!(cli.json);
        assert_eq!(cli.database, Some(PathBuf::from("/tmp/kpi.db")));
        assert!(matches!(cli.command, Commands::Provider(ProviderArgs { provider_id: 42 })));
    }

    #[test]
    fn run_accepts_change_days_override() {
        let cli = Cli::parse_from(["clinical-kpi", "run", "--change-days", "14"]);
        match cli.command {
            Commands::Run(args) => assert_eq!(args.change_days, Some(14)),
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
