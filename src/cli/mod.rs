//! Command-line interface.

pub mod commands;
pub mod output;
pub mod types;

use anyhow::Result;

use crate::domain::models::Config;
use crate::infrastructure::config::ConfigLoader;
use crate::infrastructure::logging::{LogConfig, LoggerImpl};

pub use types::{Cli, Commands, GlobalOptions};

/// Load configuration from `--config` or the default layering.
pub fn load_config(global: &GlobalOptions) -> Result<Config> {
    match global.config {
        Some(ref path) => ConfigLoader::load_from_file(path),
        None => ConfigLoader::load(),
    }
}

/// Install logging for a command. Keep the guard alive until exit.
pub fn init_logging(config: &Config, global: &GlobalOptions) -> Result<LoggerImpl> {
    LoggerImpl::init(&LogConfig::from_settings(&config.logging, global.debug)?)
}

/// Print a command error and exit non-zero.
pub fn handle_error(err: anyhow::Error, json_mode: bool) -> ! {
    if json_mode {
        let chain: Vec<String> = err.chain().skip(1).map(ToString::to_string).collect();
        let body = serde_json::json!({
            "error": err.to_string(),
            "causes": chain,
        });
        println!("{}", serde_json::to_string_pretty(&body).unwrap_or_default());
    } else {
        eprintln!("Error: {err:#}");
    }
    std::process::exit(1);
}
