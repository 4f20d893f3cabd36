//! Config Command
//!
//! Inspect the effective configuration.
//!
//! Usage:
//!   codeheal config show [-f json]
//!   codeheal config path

use crate::cli::util::{CommandContext, OutputFormat};
use crate::config::ConfigLoader;
use crate::types::Result;

/// Show merged configuration (defaults, file, environment)
pub fn show(ctx: &CommandContext, format: &str) -> Result<()> {
    let format: OutputFormat = format.parse()?;
    let rendered = ConfigLoader::render(&ctx.config, format == OutputFormat::Json)?;
    println!("{}", rendered.trim_end());
    Ok(())
}

/// Show configuration file paths
pub fn path(ctx: &CommandContext) {
    match &ctx.config_path {
        Some(path) => println!("Config file: {} (--config)", path.display()),
        None => match ConfigLoader::global_config_path() {
            Some(path) => {
                let state = if path.exists() { "" } else { " (not created)" };
                println!("Config file: {}{}", path.display(), state);
            }
            None => println!("Cannot determine global config directory."),
        },
    }
    println!("Environment: CODEHEAL_MAX_RETRIES, CODEHEAL_AUTO_FORMAT, CODEHEAL_ENABLE_LEARNING");
}
