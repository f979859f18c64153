// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! twinring CLI
//!
//! Command-line interface for twinring shared memory queues.

use clap::{Parser, Subcommand};

mod commands;

use commands::pingpong::Role;

/// twinring - SPSC byte queues over double-mapped shared memory
#[derive(Parser)]
#[command(name = "twinring")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file path (built-in defaults when omitted)
    #[arg(short, long)]
    pub config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the seeding side of a round-trip run
    Ping {
        /// Override the configured number of messages
        #[arg(short = 'n', long)]
        iterations: Option<u64>,
    },

    /// Start the echoing side of a round-trip run
    Pong {
        /// Override the configured number of messages
        #[arg(short = 'n', long)]
        iterations: Option<u64>,
    },

    /// Show the state of an existing queue
    Probe {
        /// Region name, e.g. /twinring.ping
        name: String,
    },

    /// Remove a region name
    Unlink {
        /// Region name, e.g. /twinring.ping
        name: String,
    },

    /// Validate a configuration file
    Validate {
        /// Path to the configuration file
        file: String,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt().with_env_filter(log_level).init();

    // Dispatch to command handlers
    match cli.command {
        Commands::Ping { iterations } => {
            commands::pingpong::execute(cli.config.as_deref(), Role::Ping, iterations)
        }
        Commands::Pong { iterations } => {
            commands::pingpong::execute(cli.config.as_deref(), Role::Pong, iterations)
        }
        Commands::Probe { name } => commands::probe::execute(&name),
        Commands::Unlink { name } => commands::unlink::execute(&name),
        Commands::Validate { file } => commands::validate::execute(&file),
    }
}
