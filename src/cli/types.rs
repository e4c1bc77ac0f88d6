//! CLI type definitions
//!
//! This module contains clap command structures that define the CLI interface.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use super::commands::config::ConfigArgs;
use super::commands::history::HistoryArgs;
use super::commands::report::ReportArgs;
use super::commands::run::RunArgs;

#[derive(Parser, Debug)]
#[command(name = "nightpatch")]
#[command(about = "Nightly repository reviewer that opens pull requests for verified bug fixes", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[command(flatten)]
    pub global: GlobalOptions,
}

/// Options accepted by every subcommand.
#[derive(Args, Debug, Clone, Default)]
pub struct GlobalOptions {
    /// Configuration file (defaults to .nightpatch/config.yaml layering)
    #[arg(short, long, global = true, env = "NIGHTPATCH_CONFIG")]
    pub config: Option<PathBuf>,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,

    /// Force debug-level logging
    #[arg(long, global = true)]
    pub debug: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Review every configured repository once
    Run(RunArgs),

    /// List recent review runs
    History(HistoryArgs),

    /// Show per-repository outcomes of a run
    Report(ReportArgs),

    /// Inspect the effective configuration
    Config(ConfigArgs),
}
