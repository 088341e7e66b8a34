use anyhow::Result;
use clap::{Args, Subcommand};

use crate::cli::context::CliContext;
use crate::cli::output::OutputFormat;

#[derive(Args, Clone, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Clone, Debug)]
pub enum ConfigAction {
    /// Show the effective configuration
    Show,

    /// Print the configuration file location
    Path,

    /// Validate the effective configuration
    Validate,
}

pub async fn cmd_config(args: ConfigArgs, ctx: &CliContext, format: OutputFormat) -> Result<()> {
    match args.action {
        ConfigAction::Show => match format.render(ctx.config())? {
            Some(rendered) => println!("{rendered}"),
            None => {
                println!("Current configuration ({}):", ctx.config_path().display());
                println!("{}", serde_yaml::to_string(ctx.config())?);
            }
        },
        ConfigAction::Path => println!("{}", ctx.config_path().display()),
        ConfigAction::Validate => {
            ctx.config().validate()?;
            println!("Configuration is valid");
        }
    }
    Ok(())
}
