//! Router configuration
//!
//! Defaults are overridden by an optional TOML file, then by `ROUTER_*`
//! environment variables, then by whatever the caller sets explicitly.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Errors produced while loading or validating configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("Failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Config file is not valid TOML for this schema
    #[error("Invalid config {path}: {message}")]
    Parse { path: PathBuf, message: String },

    /// A value is out of range
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Result type alias for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Configuration for the routing core
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    /// Directory holding every persisted resource
    pub data_dir: PathBuf,

    /// Durable trust weights `{agent: {trust, type?}}`
    pub trust_path: PathBuf,

    /// Fast-read trust snapshot `{agent: trust}`
    pub trust_snapshot_path: PathBuf,

    /// Runtime memory holding the routing history
    pub history_path: PathBuf,

    /// Per-agent result contracts for the reflector
    pub schema_path: PathBuf,

    /// Scene status map `{scene: status}`
    pub scene_status_path: PathBuf,

    /// Append-only audit log; its digest lives next to it with a `.sha256` extension
    pub audit_log_path: PathBuf,

    /// Routing decisions kept in history
    pub history_limit: usize,

    /// Backup generations rotated on every write
    pub backup_generations: usize,

    /// Files above this size are quarantined instead of loaded
    pub max_store_bytes: u64,

    /// Attempts per write before giving up
    pub write_retries: u32,

    /// Confidence below this escalates
    pub uncertainty_threshold: f64,

    /// Trust weight below this escalates
    pub trust_threshold: f64,

    /// Trust seeded for an agent the first time it is registered
    pub initial_trust: f64,

    /// Added to an agent's trust after a clean result
    pub trust_reward: f64,

    /// Subtracted from an agent's trust after a forced fallback
    pub trust_penalty: f64,

    /// Deadline for a single handler invocation
    pub handler_timeout_ms: u64,

    /// Width of the predictive trust window
    pub ledger_window_secs: i64,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(".router-state"),
            trust_path: PathBuf::from("trust_weights.json"),
            trust_snapshot_path: PathBuf::from("trust_registry_store.json"),
            history_path: PathBuf::from("runtime_memory.json"),
            schema_path: PathBuf::from("runtime_schema.json"),
            scene_status_path: PathBuf::from("scene_status.json"),
            audit_log_path: PathBuf::from("scene_audit.jsonl"),
            history_limit: 500,
            backup_generations: 3,
            max_store_bytes: 5 * 1024 * 1024,
            write_retries: 3,
            uncertainty_threshold: 0.3,
            trust_threshold: 0.5,
            initial_trust: 0.75,
            trust_reward: 0.05,
            trust_penalty: 0.1,
            handler_timeout_ms: 10_000,
            ledger_window_secs: 3600,
        }
    }
}

impl RouterConfig {
    /// Load from a TOML file. Missing keys keep their defaults.
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Create config from environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env();
        config
    }

    /// Overlay `ROUTER_*` environment variables onto this config
    pub fn apply_env(&mut self) {
        if let Ok(dir) = std::env::var("ROUTER_DATA_DIR") {
            self.data_dir = PathBuf::from(dir);
        }
        if let Ok(path) = std::env::var("ROUTER_TRUST_PATH") {
            self.trust_path = PathBuf::from(path);
        }
        if let Ok(path) = std::env::var("ROUTER_HISTORY_PATH") {
            self.history_path = PathBuf::from(path);
        }
        if let Ok(path) = std::env::var("ROUTER_SCHEMA_PATH") {
            self.schema_path = PathBuf::from(path);
        }
        if let Ok(path) = std::env::var("ROUTER_AUDIT_LOG_PATH") {
            self.audit_log_path = PathBuf::from(path);
        }
        if let Some(n) = env_parse("ROUTER_HISTORY_LIMIT") {
            self.history_limit = n;
        }
        if let Some(n) = env_parse("ROUTER_BACKUP_GENERATIONS") {
            self.backup_generations = n;
        }
        if let Some(n) = env_parse("ROUTER_WRITE_RETRIES") {
            self.write_retries = n;
        }
        if let Some(v) = env_parse("ROUTER_UNCERTAINTY_THRESHOLD") {
            self.uncertainty_threshold = v;
        }
        if let Some(v) = env_parse("ROUTER_TRUST_THRESHOLD") {
            self.trust_threshold = v;
        }
        if let Some(ms) = env_parse("ROUTER_HANDLER_TIMEOUT_MS") {
            self.handler_timeout_ms = ms;
        }
    }

    /// Resolve file names relative to the data directory
    pub fn resolve_paths(&mut self) {
        let dir = self.data_dir.clone();
        for path in [
            &mut self.trust_path,
            &mut self.trust_snapshot_path,
            &mut self.history_path,
            &mut self.schema_path,
            &mut self.scene_status_path,
            &mut self.audit_log_path,
        ] {
            if path.is_relative() {
                *path = dir.join(&*path);
            }
        }
    }

    /// Config rooted at `data_dir` with every path resolved
    pub fn rooted_at(data_dir: impl Into<PathBuf>) -> Self {
        let mut config = Self {
            data_dir: data_dir.into(),
            ..Self::default()
        };
        config.resolve_paths();
        config
    }

    /// Reject values the engines cannot work with
    pub fn validate(&self) -> ConfigResult<()> {
        for (name, value) in [
            ("uncertainty_threshold", self.uncertainty_threshold),
            ("trust_threshold", self.trust_threshold),
            ("initial_trust", self.initial_trust),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::Invalid(format!(
                    "{} must be within [0, 1], got {}",
                    name, value
                )));
            }
        }
        if self.history_limit == 0 {
            return Err(ConfigError::Invalid(
                "history_limit must be at least 1".to_string(),
            ));
        }
        if self.ledger_window_secs <= 0
            || chrono::Duration::try_seconds(self.ledger_window_secs).is_none()
        {
            return Err(ConfigError::Invalid(format!(
                "ledger_window_secs must be a positive number of seconds, got {}",
                self.ledger_window_secs
            )));
        }
        if self.write_retries == 0 {
            return Err(ConfigError::Invalid(
                "write_retries must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Handler deadline as a `Duration`
    pub fn handler_timeout(&self) -> Duration {
        Duration::from_millis(self.handler_timeout_ms)
    }

    /// Sibling digest file for the audit log
    pub fn audit_digest_path(&self) -> PathBuf {
        self.audit_log_path.with_extension("sha256")
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok()?.parse().ok()
}
