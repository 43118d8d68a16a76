//! Command Line Interface module
//!
//! Implements the CLI commands and argument parsing for sessionlink.

use clap::{Parser, Subcommand};

#[derive(Parser, Debug, Clone)]
#[command(name = "sessionlink")]
#[command(about = "Sessionlink Session Channel Client")]
#[command(long_about = "A persistent real-time session channel client with heartbeat, \
reconnection backoff and forced-logout handling")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file path
    #[arg(long, default_value = "config.toml")]
    pub config_file: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Attach a session channel and stream server events
    Run {
        /// Identity announced in the login frame
        #[arg(long)]
        userid: String,

        /// Server URL override (ws:// or wss://)
        #[arg(long)]
        url: Option<String>,
    },

    /// Ask the server to revoke another user's session
    Kick {
        /// Identity whose session should be revoked
        target: String,

        /// Identity announced in the login frame
        #[arg(long)]
        userid: String,

        /// Server URL override (ws:// or wss://)
        #[arg(long)]
        url: Option<String>,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: Option<ConfigAction>,
    },
}

#[derive(Subcommand, Debug, Clone)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Reset configuration to defaults
    Reset,
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Effective log level, honoring the verbose flag
    pub fn effective_log_level(&self) -> String {
        if self.verbose {
            "debug".to_string()
        } else {
            self.log_level.clone()
        }
    }
}
