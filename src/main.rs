// Copyright 2026 Courtfetch Contributors
// SPDX-License-Identifier: Apache-2.0

use anyhow::Result;
use clap::{Parser, Subcommand};
use courtfetch::cli;
use courtfetch::config::AppConfig;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "courtfetch",
    about = "Court case-status fetcher for the Delhi High Court",
    version,
    after_help = "Run 'courtfetch <command> --help' for details on each command.\nRun 'courtfetch' with no command to start the server."
)]
struct Cli {
    /// Enable verbose/debug logging
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server
    Serve {
        /// Bind address (overrides COURTFETCH_HOST)
        #[arg(long)]
        host: Option<String>,
        /// Bind port (overrides COURTFETCH_PORT)
        #[arg(long)]
        port: Option<u16>,
        /// SQLite query-log path (overrides COURTFETCH_DB)
        #[arg(long)]
        db: Option<PathBuf>,
    },
    /// Check environment: Chromium, database, target-site reachability
    Doctor,
    /// Probe the live CAPTCHA widget and report what it displays
    ProbeCaptcha,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let directive = if cli.verbose {
        "courtfetch=debug"
    } else {
        "courtfetch=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(directive.parse().unwrap()),
        )
        .init();

    let mut config = AppConfig::from_env()?;

    let result = match cli.command {
        // No subcommand → serve with env/default settings
        None => cli::serve::run(config).await,

        Some(Commands::Serve { host, port, db }) => {
            if let Some(host) = host {
                config.host = host;
            }
            if let Some(port) = port {
                config.port = port;
            }
            if let Some(db) = db {
                config.database_path = db;
            }
            cli::serve::run(config).await
        }
        Some(Commands::Doctor) => cli::doctor::run(config).await,
        Some(Commands::ProbeCaptcha) => cli::probe::run(config).await,
    };

    // Consistent exit codes: 0=success, 1=error
    if let Err(e) = &result {
        eprintln!("  Error: {e:#}");
        std::process::exit(1);
    }

    result
}
