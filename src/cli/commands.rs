//! CLI command implementations
//!
//! `check` and `record` act on the configured store, so with the file
//! backend they see and change the same counters as a running server.

use serde::Serialize;
use serde_json::{json, Value};

use crate::access::{AccessDecision, AccessLevel, Feature};
use crate::config::GateConfig;
use crate::http_server::HttpServer;

use super::args::{Command, GateArgs};
use super::errors::CliResult;

/// Run a parsed command
pub async fn run(command: Command) -> CliResult<()> {
    match command {
        Command::Serve { config, port } => {
            let mut config = GateConfig::load_or_default(&config)?;
            if let Some(port) = port {
                config.server.port = port;
            }
            config.validate().map_err(crate::config::ConfigError::Invalid)?;
            HttpServer::new(config).start().await?;
            Ok(())
        }
        Command::Features => write_json(&features()),
        Command::Policy { config, level } => {
            let config = GateConfig::load_or_default(&config)?;
            write_json(&policy(&config, level)?)
        }
        Command::Check(args) => write_json(&check(&args).await?),
        Command::Record(args) => write_json(&record(&args).await?),
    }
}

fn write_json<T: Serialize>(value: &T) -> CliResult<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Feature catalogue
pub fn features() -> Value {
    Value::Array(
        Feature::ALL
            .iter()
            .map(|f| json!({ "feature": f, "title": f.title() }))
            .collect(),
    )
}

/// Effective policy, optionally narrowed to one level
pub fn policy(config: &GateConfig, level: Option<AccessLevel>) -> CliResult<Value> {
    let snapshot = config.build_policy().snapshot();
    match level {
        Some(level) => Ok(json!({
            "window": snapshot.window,
            "level": level,
            "rules": snapshot.levels.get(&level),
        })),
        None => Ok(serde_json::to_value(snapshot)?),
    }
}

/// Access decision for the session described by `args`
pub async fn check(args: &GateArgs) -> CliResult<AccessDecision> {
    let config = GateConfig::load_or_default(&args.config)?;
    let gate = config.build_gate().await?;
    Ok(gate.check_access(&args.session(), args.feature).await)
}

/// Record one use, then report the resulting decision
pub async fn record(args: &GateArgs) -> CliResult<AccessDecision> {
    let config = GateConfig::load_or_default(&args.config)?;
    let gate = config.build_gate().await?;
    let ctx = args.session();
    gate.increment_usage(&ctx, args.feature).await;
    Ok(gate.check_access(&ctx, args.feature).await)
}
