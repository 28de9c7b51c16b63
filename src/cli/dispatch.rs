use anyhow::Result;

use super::demo::cmd_demo;
use super::env::CliArgs;
use super::filters::cmd_filters;
use super::panel::cmd_panel;
use crate::cli::commands::Commands;
use crate::cli::context::CliContext;

pub async fn dispatch(cli: &CliArgs, ctx: &CliContext) -> Result<()> {
    match cli.command.clone() {
        Commands::Filters(args) => cmd_filters(args, ctx, cli.output).await,
        Commands::Panel(args) => cmd_panel(args, ctx, cli.output).await,
        Commands::Demo(args) => cmd_demo(args, ctx, cli.output).await,
    }
}
