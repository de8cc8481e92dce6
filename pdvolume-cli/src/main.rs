//! pdvolume command-line interface.

mod cli;
mod commands;

use clap::Parser;

use crate::cli::{Cli, Commands};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Keep guard alive until end of main to ensure logs are written
    let _log_guard =
        pdvolume::util::init_logging(cli.global.log_dir.as_deref(), &cli.global.log_level)?;

    match cli.command {
        Commands::Setup(args) => commands::setup::execute(args, &cli.global),
        Commands::Teardown(args) => commands::teardown::execute(args, &cli.global),
    }
}
