//! Command-line interface. `serve` is the default when no subcommand is given.

mod commands;

use clap::{Parser, Subcommand};

/// Notegate - authentication and collection quota backend
#[derive(Parser)]
#[command(name = "notegate")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP API server
    #[command(alias = "web")]
    Serve,

    /// Load and validate the configuration, then exit
    CheckConfig,

    /// List local users
    #[command(alias = "ls")]
    Users {
        /// Page number, starting at 1
        #[arg(long, default_value = "1")]
        page: u64,
    },

    /// Issue a fresh API key for a user, bypassing the HTTP admin gate
    GrantKey {
        /// Local user id
        user_id: String,
        /// Days until expiry; omit for a key that never expires
        #[arg(long)]
        days: Option<i64>,
    },
}

pub use commands::*;
