// SPDX-FileCopyrightText: 2026 Tianshu Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tianshu - delivery routing and translation between a Matrix bus and
//! external chat platforms.
//!
//! This is the binary entry point for the bridge hub.

mod serve;
mod shutdown;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tianshu_config::{ConfigError, TianshuConfig};

/// Tianshu - delivery routing between Matrix and Feishu/Telegram.
#[derive(Parser, Debug)]
#[command(name = "tianshu", version, about, long_about = None)]
struct Cli {
    /// Read configuration from this file instead of the XDG hierarchy.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the bridge: sync loops, platform adapters, and the gateway.
    Serve,
    /// Validate the configuration and exit.
    CheckConfig,
}

fn load(path: Option<&PathBuf>) -> Result<TianshuConfig, Vec<ConfigError>> {
    match path {
        Some(path) => tianshu_config::load_and_validate_path(path),
        None => tianshu_config::load_and_validate(),
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match load(cli.config.as_ref()) {
        Ok(config) => config,
        Err(errors) => {
            tianshu_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    match cli.command {
        Some(Commands::Serve) => {
            if let Err(e) = serve::run_serve(config).await {
                eprintln!("error: {e}");
                std::process::exit(1);
            }
        }
        Some(Commands::CheckConfig) => {
            println!(
                "tianshu: config ok (service.name={}, homeserver={})",
                config.service.name, config.matrix.homeserver
            );
        }
        None => {
            println!("tianshu: use --help for available commands");
        }
    }
}
