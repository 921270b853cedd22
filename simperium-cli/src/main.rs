//! `simperium`: talk to a Simperium app from the shell.
//!
//! Usage:
//!   simperium --app myapp --token TOKEN --bucket notes get item1
//!   simperium --app myapp --api-key KEY authorize alice --password secret
//!   simperium --app myapp --token TOKEN --bucket notes changes --follow

use anyhow::Result;
use clap::Parser;
use simperium_cli::Cli;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    simperium_cli::run(&cli, &mut out).await
}
