use super::config::cmd_config;
use super::env::CliArgs;
use super::fingerprint::cmd_fingerprint;
use super::ticks::cmd_ticks;
use crate::cli::commands::Commands;
use crate::cli::context::CliContext;
use anyhow::Result;

pub async fn dispatch(cli: &CliArgs, ctx: &CliContext) -> Result<()> {
    match cli.command.clone() {
        Commands::Ticks(args) => cmd_ticks(args, ctx, cli.output.clone()).await,
        Commands::Fingerprint(args) => cmd_fingerprint(args, ctx, cli.output.clone()).await,
        Commands::Config(args) => cmd_config(args, ctx, cli.output.clone()).await,
    }
}
