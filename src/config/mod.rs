//! # Configuration
//!
//! TOML configuration for the gate service and CLI. Every field has a
//! default, so an empty file (or no file) yields a working setup on the
//! built-in policy and an in-memory store.
//!
//! ```toml
//! [server]
//! host = "0.0.0.0"
//! port = 54330
//!
//! [store]
//! backend = "file"
//! path = "./data/usage.json"
//! timeout_ms = 2000
//!
//! [policy]
//! window = "daily"
//! disabled_features = ["mind_map_maker"]
//!
//! [policy.levels.free]
//! drug_reference = 10
//! ai_chatbot = "disabled"
//! ```

pub mod validator;

pub use validator::*;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::access::{
    AccessLevel, Feature, FeatureAccessGate, QuotaPolicy, QuotaRule, QuotaWindow,
};
use crate::store::{FileUsageStore, MemoryUsageStore, StoreResult, UsageStore};

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid configuration:\n{}", format_validation_errors(.0))]
    Invalid(Vec<ConfigValidationError>),
}

/// Gate service configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GateConfig {
    pub server: ServerConfig,
    pub store: StoreConfig,
    pub policy: PolicyConfig,
}

/// HTTP listener
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 54330,
        }
    }
}

/// Usage store backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Memory,
    File,
}

/// Usage store settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    /// Required for the file backend
    pub path: Option<PathBuf>,
    /// Bound on each store round trip
    pub timeout_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Memory,
            path: None,
            timeout_ms: 2000,
        }
    }
}

/// Quota policy overrides
///
/// Level and feature names are kept as strings here so that unknown names
/// are reported by validation rather than as a parse failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PolicyConfig {
    pub window: QuotaWindow,
    /// Start from the built-in table; when false, unlisted pairs are disabled
    pub inherit_defaults: bool,
    /// Features switched off for every level
    pub disabled_features: Vec<String>,
    pub levels: BTreeMap<String, BTreeMap<String, QuotaRule>>,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            window: QuotaWindow::Daily,
            inherit_defaults: true,
            disabled_features: Vec::new(),
            levels: BTreeMap::new(),
        }
    }
}

impl GateConfig {
    /// Load and validate a config file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    /// Load `path` if it exists, defaults otherwise
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::load(path)
        } else {
            tracing::info!(path = %path.display(), "config file not found, using defaults");
            Ok(Self::default())
        }
    }

    /// Parse and validate TOML
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(contents)?;
        config.validate().map_err(ConfigError::Invalid)?;
        Ok(config)
    }

    /// Check every field, collecting all problems
    pub fn validate(&self) -> ConfigResult<()> {
        let mut v = ConfigValidator::new();
        v.validate_non_empty("server.host", &self.server.host)
            .validate_port("server.port", self.server.port)
            .validate_duration_ms("store.timeout_ms", self.store.timeout_ms, 1, 60_000);

        if self.store.backend == StoreBackend::File {
            let path = self
                .store
                .path
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_default();
            v.validate_non_empty("store.path", &path);
        }

        for name in &self.policy.disabled_features {
            v.validate_parse::<Feature>("policy.disabled_features", name, "feature");
        }

        for (level, rules) in &self.policy.levels {
            v.validate_parse::<AccessLevel>("policy.levels", level, "access level");
            for feature in rules.keys() {
                v.validate_parse::<Feature>(
                    &format!("policy.levels.{}", level),
                    feature,
                    "feature",
                );
            }
        }

        v.finish()
    }

    /// Effective quota policy
    pub fn build_policy(&self) -> QuotaPolicy {
        let mut policy = if self.policy.inherit_defaults {
            QuotaPolicy::builtin(self.policy.window)
        } else {
            QuotaPolicy::empty(self.policy.window)
        };

        for (level_name, rules) in &self.policy.levels {
            let Ok(level) = level_name.parse::<AccessLevel>() else {
                tracing::warn!(level = %level_name, "skipping unknown access level");
                continue;
            };
            for (feature_name, rule) in rules {
                match feature_name.parse::<Feature>() {
                    Ok(feature) => policy.set_rule(level, feature, *rule),
                    Err(_) => tracing::warn!(feature = %feature_name, "skipping unknown feature"),
                }
            }
        }

        for name in &self.policy.disabled_features {
            if let Ok(feature) = name.parse::<Feature>() {
                policy.disable_feature(feature);
            }
        }

        policy
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store.timeout_ms)
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// Open the configured usage store
    pub async fn open_store(&self) -> StoreResult<Arc<dyn UsageStore>> {
        match (self.store.backend, &self.store.path) {
            (StoreBackend::File, Some(path)) => {
                Ok(Arc::new(FileUsageStore::open(path.clone()).await?))
            }
            _ => Ok(Arc::new(MemoryUsageStore::new())),
        }
    }

    /// Gate wired to the configured policy and store
    pub async fn build_gate(&self) -> StoreResult<FeatureAccessGate> {
        let store = self.open_store().await?;
        Ok(FeatureAccessGate::new(Arc::new(self.build_policy()), store)
            .with_store_timeout(self.store_timeout()))
    }
}
