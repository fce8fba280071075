//! CLI command definitions and dispatch for the `huddle` binary.
//!
//! Uses clap derive macros for argument parsing. Resource commands follow a
//! noun-verb pattern (e.g., `huddle user create`, `huddle session issue`).

pub mod conversation;
pub mod session;
pub mod status;
pub mod user;

use clap::{Parser, Subcommand};
use clap_complete::Shell;

/// Real-time conversation server.
#[derive(Parser)]
#[command(name = "huddle", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all output except errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for verbose, -vv for debug/trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Also export spans through OpenTelemetry (stdout exporter).
    #[arg(long, global = true, env = "HUDDLE_OTEL")]
    pub otel: bool,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP and WebSocket server.
    Serve {
        /// Port to listen on (defaults to `port` in config.toml).
        #[arg(short, long)]
        port: Option<u16>,

        /// Host to bind to (defaults to `host` in config.toml).
        #[arg(long)]
        host: Option<String>,
    },

    /// Manage users.
    User {
        #[command(subcommand)]
        action: UserCommand,
    },

    /// Manage bearer sessions.
    Session {
        #[command(subcommand)]
        action: SessionCommand,
    },

    /// List the conversations a user participates in.
    Conversations {
        /// User id to list conversations for.
        user_id: String,
    },

    /// Store and configuration status.
    Status,

    /// Generate shell completions.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}

#[derive(Subcommand)]
pub enum UserCommand {
    /// Register a user and issue a first session token.
    Create {
        /// Email address.
        email: String,

        /// Display name.
        #[arg(long)]
        name: Option<String>,

        /// Username to claim right away.
        #[arg(long)]
        username: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum SessionCommand {
    /// Issue a new bearer token for an existing user.
    Issue {
        /// User id.
        user_id: String,
    },

    /// Delete sessions that have expired.
    Purge,
}
