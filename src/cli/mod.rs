//! # CLI
//!
//! Operator commands for serving the gate and inspecting quotas.

pub mod args;
pub mod commands;
pub mod errors;

pub use args::{Cli, Command, GateArgs};
pub use commands::run;
pub use errors::{CliError, CliResult};
