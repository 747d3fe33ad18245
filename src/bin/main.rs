//! aihub binary.
//!
//! Command-line entry point for inspecting model catalogs, backend routing,
//! prompt templates and option conversion with the layered configuration.

use aihub_core::{
    cli::commands::Commands,
    cli::handlers::{handle_config, handle_models, handle_options, handle_prompt},
    config::{ConfigArgs, ServiceConfig},
};
use clap::Parser;
use tracing::debug;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub config: ConfigArgs,

    #[command(subcommand)]
    pub command: Commands,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = ServiceConfig::load(&cli.config)?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(
                    config.logging.level.parse::<LevelFilter>().unwrap_or(LevelFilter::INFO).into(),
                )
                .parse_lossy(config.logging.filter.as_deref().unwrap_or("")),
        )
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    debug!("aihub starting up");

    match cli.command {
        Commands::Models(cmd) => handle_models(cmd.action, &config).await?,
        Commands::Prompt(cmd) => handle_prompt(cmd.action).await?,
        Commands::Options(cmd) => handle_options(cmd.action).await?,
        Commands::Config(cmd) => handle_config(cmd.action, &config).await?,
    }

    Ok(())
}
