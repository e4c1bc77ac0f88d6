//! Nightpatch CLI entry point.

use clap::Parser;

use nightpatch::cli::{commands, handle_error, Cli, Commands};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let global = cli.global;

    let result = match cli.command {
        Commands::Run(args) => commands::run::execute(args, &global).await,
        Commands::History(args) => commands::history::execute(args, &global).await,
        Commands::Report(args) => commands::report::execute(args, &global).await,
        Commands::Config(args) => commands::config::execute(args, &global).await,
    };

    if let Err(err) = result {
        handle_error(err, global.json);
    }
}
