mod cli;
mod config;
mod logging;
mod session;

use anyhow::Context;
use clap::Parser;
use engine_logging::{engine_info, engine_warn};

use crate::cli::Cli;
use crate::config::HarvestConfig;
use crate::logging::LogDestination;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::initialize(
        cli.log_level(),
        LogDestination::from_option(cli.log_file.as_deref()),
    );

    let mut config = match &cli.config {
        Some(path) => HarvestConfig::load(path)?,
        None => HarvestConfig::default(),
    };
    cli.apply(&mut config);
    config.validate()?;
    let url = config
        .url
        .clone()
        .context("no page to harvest: pass a URL or set `url` in the config file")?;

    let summary = session::run(&config, &url).await?;
    let report = &summary.report;
    match report.stop_reason {
        Some(reason) => engine_info!("finished: {}", reason),
        None => engine_info!("finished"),
    }
    engine_info!(
        "{} threads harvested in {} scroll attempts; data in {}",
        report.processed,
        report.scroll_attempts,
        summary.cumulative_file.display()
    );
    if report.failed_batches > 0 {
        engine_warn!(
            "{} batches could not be saved; see the log for details",
            report.failed_batches
        );
    }
    Ok(())
}
