use anyhow::Context;
use clap::Parser;
use tracing::debug;

use fin_cli::cli::Cli;
use fin_cli::config::AppConfig;
use fin_cli::{app, logging};
use fin_core::recurrence::schedule::local_today;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = AppConfig::load(cli.config.as_deref())
        .context("loading configuration")?
        .with_database_overrides(cli.backend, cli.db);
    logging::init_logging(&config.logging)?;
    debug!(?config, "configuration loaded");

    let output = app::run(cli.command, &config, local_today()).await?;
    print!("{output}");

    Ok(())
}
