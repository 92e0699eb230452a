use clap::Parser;

use clinical_kpi::adapter::inbound::cli::{self, output, Cli};

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();

    let args = Cli::parse();
    if let Err(e) = cli::execute(args).await {
        output::error(&e.to_string());
        std::process::exit(1);
    }
}
