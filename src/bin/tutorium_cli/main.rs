//! tutorium-cli: command-line client for the public and admin listeners.
#![deny(clippy::all, clippy::pedantic)]

mod args;
mod client;
mod handlers;
mod print;

use clap::Parser;

use args::{Cli, Commands};
use client::{CliError, build_ctx_from_cli};
use handlers::{cache, posts};

#[tokio::main]
async fn main() -> Result<(), CliError> {
    let cli = Cli::parse();
    let ctx = build_ctx_from_cli(&cli)?;

    match cli.command {
        Commands::Posts(cmd) => posts::handle(&ctx, cmd.action).await?,
        Commands::Cache(cmd) => cache::handle(&ctx, cmd.action).await?,
    }

    Ok(())
}
