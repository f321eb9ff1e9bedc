//! harmon CLI - customs classification comparison
//!
//! Usage:
//!   harmon serve --port 3000       Start the web server
//!   harmon compare --name "boots"  Run one comparison, print JSON
//!   harmon providers               Check backend reachability
//!   harmon stats                   Query a running server's statistics

mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::*;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact())
        .init();

    let config = harmon_core::AppConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Serve { port, host } => commands::cmd_serve(&host, port, config).await,
        Commands::Compare {
            name,
            description,
            image_url,
            image_file,
            origin,
            destination,
            value,
            currency,
            providers,
            no_duty,
        } => {
            commands::cmd_compare(
                config,
                commands::CompareArgs {
                    name,
                    description,
                    image_url,
                    image_file,
                    origin,
                    destination,
                    value,
                    currency,
                    providers,
                    no_duty,
                },
            )
            .await
        }
        Commands::Providers => commands::cmd_providers(config).await,
        Commands::Stats { server_url } => commands::cmd_stats(&server_url).await,
    }
}
