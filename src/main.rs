use std::process::ExitCode;

use clap::Parser;
use dealerbook::cli::{Cli, exit_code};
use dealerbook::config::Settings;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let settings = match Settings::load() {
        Ok(settings) => settings,
        Err(err) => {
            eprintln!("Error: invalid configuration: {err}");
            return ExitCode::from(2);
        }
    };

    let default_filter = if cli.verbose {
        "dealerbook=debug,sqlx=warn"
    } else {
        settings.log.filter.as_str()
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.run(settings).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err:#}");
            ExitCode::from(exit_code(&err))
        }
    }
}
