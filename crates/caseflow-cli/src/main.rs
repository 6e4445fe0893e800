//! Caseflow CLI - Command-line interface for the caseflow extraction engine.

use anyhow::Context;
use caseflow_cli::commands;
use caseflow_cli::{config, Cli, Command, Formatter};
use clap::Parser;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let formatter = Formatter::new(cli.format, !cli.no_color);

    match cli.command {
        Command::Config(args) => commands::execute_config(args, &formatter)?,
        Command::Inspect(args) => {
            let config = config::load(cli.config.as_deref()).context("loading configuration")?;
            commands::execute_inspect(args, &config, &formatter)?;
        }
        Command::Run(args) => {
            let config = config::load(cli.config.as_deref()).context("loading configuration")?;
            commands::execute_run(args, config, &formatter).await?;
        }
    }

    Ok(())
}

/// Log to stderr; `RUST_LOG` overrides the level chosen by `--verbose`.
fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .init();
}
