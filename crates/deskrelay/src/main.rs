// SPDX-FileCopyrightText: 2026 Deskrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Deskrelay - dashboard backend for a roster of office agents.
//!
//! This is the binary entry point for the deskrelay server.

use clap::{Parser, Subcommand};

use deskrelay_core::DeskrelayError;

mod serve;

/// Deskrelay - dashboard backend for a roster of office agents.
#[derive(Parser, Debug)]
#[command(name = "deskrelay", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the dashboard backend server.
    Serve,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match deskrelay_config::load_and_validate() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("deskrelay: {}", DeskrelayError::Config(e.to_string()));
            std::process::exit(1);
        }
    };

    match cli.command {
        Some(Commands::Serve) | None => {
            if let Err(e) = serve::run_serve(config).await {
                eprintln!("deskrelay: {e}");
                std::process::exit(1);
            }
        }
    }
}
