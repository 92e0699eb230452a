//! CLI module graph.
//!
//! [`execute`] loads configuration, initializes logging, and dispatches the
//! parsed [`Cli`] to its handler.

pub mod command;
pub mod config;
pub mod metrics;
pub mod output;
pub mod run;
pub mod staging;

pub use command::Cli;

use command::{Commands, ConfigCommand, StagingCommand};

use crate::error::Result;
use crate::infrastructure::config::settings::Config;

/// Run the command selected on the command line.
///
/// A missing configuration file falls back to defaults, except for
/// `config validate`.
///
/// # Errors
/// Returns the first error raised while loading configuration or running
/// the command.
pub async fn execute(cli: Cli) -> Result<()> {
    output::configure(output::OutputConfig::new(cli.json, cli.quiet));
    let database = cli.database.map(|p| p.display().to_string());

    if let Commands::Config(ConfigCommand::Validate) = cli.command {
        return config::execute_validate(&cli.config, database);
    }

    let mut settings = Config::load_or_default(&cli.config)?;
    settings.override_database(database);
    settings.validate()?;
    settings.init_logging();

    match &cli.command {
        Commands::Run(args) => run::execute(settings, args).await,
        Commands::Provider(args) => metrics::execute_provider(&settings, args),
        Commands::Market(args) => metrics::execute_market(&settings, args),
        Commands::Staging(StagingCommand::Clear) => staging::execute_clear(&settings),
        Commands::Config(ConfigCommand::Show) => config::execute_show(&settings),
        Commands::Config(ConfigCommand::Validate) => {
            config::execute_validate(&cli.config, None)
        }
    }
}
