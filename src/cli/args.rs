//! CLI argument definitions using clap
//!
//! Commands:
//! - medgate serve --config <path> [--port <port>]
//! - medgate features
//! - medgate policy --config <path> [--level <level>]
//! - medgate check --config <path> --feature <feature> --level <level> [--user <id>]
//! - medgate record --config <path> --feature <feature> --level <level> [--user <id>]

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::access::{AccessLevel, Feature, SessionContext};

/// medgate - feature access and usage quota gate
#[derive(Parser, Debug)]
#[command(name = "medgate")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Log filter used when MEDGATE_LOG is not set
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the HTTP gate for tool pages
    Serve {
        /// Path to configuration file (defaults apply when missing)
        #[arg(long, default_value = "./medgate.toml")]
        config: PathBuf,

        /// Override the configured port
        #[arg(long)]
        port: Option<u16>,
    },

    /// List gated features
    Features,

    /// Show the effective quota policy
    Policy {
        /// Path to configuration file (defaults apply when missing)
        #[arg(long, default_value = "./medgate.toml")]
        config: PathBuf,

        /// Only show this level
        #[arg(long)]
        level: Option<AccessLevel>,
    },

    /// Check access for a session without counting a use
    Check(GateArgs),

    /// Record one use for a session
    Record(GateArgs),
}

/// Session and feature to act on
#[derive(Args, Debug)]
pub struct GateArgs {
    /// Path to configuration file (defaults apply when missing)
    #[arg(long, default_value = "./medgate.toml")]
    pub config: PathBuf,

    /// Feature name, e.g. drug_reference
    #[arg(long)]
    pub feature: Feature,

    /// Access level of the session
    #[arg(long, default_value = "anonymous")]
    pub level: AccessLevel,

    /// Signed-in user id
    #[arg(long)]
    pub user: Option<String>,

    /// Anonymous bucket key (session key or client address)
    #[arg(long)]
    pub anonymous_key: Option<String>,
}

impl GateArgs {
    pub fn session(&self) -> SessionContext {
        SessionContext {
            user_id: self.user.clone(),
            level: self.level,
            anonymous_key: self.anonymous_key.clone(),
        }
    }
}
