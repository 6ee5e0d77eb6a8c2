// SPDX-FileCopyrightText: 2026 Pollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Pollgate - a Telegram poll-request bot.
//!
//! This is the binary entry point.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod serve;
mod submit;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use pollgate_config::{ConfigError, PollgateConfig};

/// Pollgate - a Telegram poll-request bot.
#[derive(Parser, Debug)]
#[command(name = "pollgate", version, about, long_about = None)]
struct Cli {
    /// Read configuration from this file instead of the standard locations.
    #[arg(short, long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the bot, the HTTP API and the delivery loops.
    Serve,
    /// Print the effective configuration with secrets redacted.
    Config,
    /// Create a poll request directly in the configured store.
    Submit {
        /// Poll question.
        #[arg(short, long)]
        message: String,
        /// Poll option; repeat for each option.
        #[arg(short, long = "button", value_name = "TEXT", required = true)]
        buttons: Vec<String>,
    },
}

fn load(path: Option<&PathBuf>) -> Result<PollgateConfig, Vec<ConfigError>> {
    match path {
        Some(path) => pollgate_config::load_and_validate_path(path),
        None => pollgate_config::load_and_validate(),
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match load(cli.config.as_ref()) {
        Ok(config) => config,
        Err(errors) => {
            pollgate_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    match cli.command {
        Some(Commands::Serve) => {
            if let Err(errors) = pollgate_config::validate_for_serve(&config) {
                pollgate_config::render_errors(&errors);
                std::process::exit(1);
            }
            if let Err(e) = serve::run_serve(config).await {
                eprintln!("error: {e}");
                std::process::exit(1);
            }
        }
        Some(Commands::Config) => match toml::to_string_pretty(&config.redacted()) {
            Ok(rendered) => print!("{rendered}"),
            Err(e) => {
                eprintln!("error: could not render configuration: {e}");
                std::process::exit(1);
            }
        },
        Some(Commands::Submit { message, buttons }) => {
            match submit::run_submit(&config, message, buttons).await {
                Ok(id) => println!("{id}"),
                Err(e) => {
                    eprintln!("error: {e}");
                    std::process::exit(1);
                }
            }
        }
        None => {
            println!("pollgate: use --help for available commands");
        }
    }
}
