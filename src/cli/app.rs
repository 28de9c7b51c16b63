use anyhow::Result;
use clap::Parser;
use tracing::{debug, error};

use super::context::CliContext;
use super::dispatch::dispatch;
use super::env::CliArgs;
use super::runtime::{init_logging, load_config};

pub async fn run() -> Result<()> {
    let cli = CliArgs::parse();

    let loaded = load_config(cli.config.as_deref())?;
    let level = cli
        .log_level
        .clone()
        .unwrap_or_else(|| loaded.config.logging.level.clone());
    init_logging(&level, cli.debug, cli.json_logs || loaded.config.logging.json)?;

    debug!(
        version = env!("CARGO_PKG_VERSION"),
        git = env!("PANELDECK_GIT_HASH"),
        "paneldeck starting"
    );

    let ctx = CliContext::new(loaded);
    match dispatch(&cli, &ctx).await {
        Ok(()) => {
            debug!("command completed");
            Ok(())
        }
        Err(err) => {
            error!("command failed: {:#}", err);
            Err(err)
        }
    }
}
