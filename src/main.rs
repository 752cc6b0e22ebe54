mod cli;
mod config;
mod consumer;
mod destination;
mod model;
mod queue;
mod source;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Command};

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so list prompts stay readable on stdout
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match &cli.command {
        Command::Extract(args) => cli::handle_extract(&cli, args).await,
        Command::Consume(args) => cli::handle_consume(&cli, args).await,
    }
}
