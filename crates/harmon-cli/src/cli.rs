//! CLI argument definitions using clap
//!
//! This module contains all the clap structs and enums for parsing CLI
//! arguments. The actual command implementations are in the `commands`
//! module.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// harmon - Compare customs-classification providers and aggregate duty
#[derive(Parser)]
#[command(name = "harmon")]
#[command(about = "Customs classification comparison and duty aggregation", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Config file path (default: ~/.config/harmon/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the web server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "3000")]
        port: u16,

        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
    },

    /// Run one comparison and print the aggregate as JSON
    Compare {
        /// Free-text product name
        #[arg(long)]
        name: Option<String>,

        /// Free-text product description
        #[arg(long)]
        description: Option<String>,

        /// Remote image URL
        #[arg(long)]
        image_url: Option<String>,

        /// Local image file, sent inline as base64
        #[arg(long, conflicts_with = "image_url")]
        image_file: Option<PathBuf>,

        /// Origin country (ISO 3166-1 alpha-2)
        #[arg(long)]
        origin: Option<String>,

        /// Destination country (default from config)
        #[arg(long)]
        destination: Option<String>,

        /// Declared product value
        #[arg(long)]
        value: Option<f64>,

        /// Currency code (default from config)
        #[arg(long)]
        currency: Option<String>,

        /// Providers to invoke (comma-separated: reasoning,structured)
        #[arg(long, default_value = "reasoning,structured")]
        providers: String,

        /// Skip the duty phase
        #[arg(long)]
        no_duty: bool,
    },

    /// Check reachability of each configured provider backend
    Providers,

    /// Fetch aggregate statistics from a running server
    Stats {
        /// Server base URL
        #[arg(long, default_value = "http://127.0.0.1:3000")]
        server_url: String,
    },
}
