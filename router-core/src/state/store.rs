//! File-backed JSON state store
//!
//! Reads never fail: a missing, empty, oversized or schema-invalid file
//! yields the caller's default, and bad files are moved aside so the next
//! reader does not trip over them again. Writes go through a temp sibling
//! and a rename so readers only ever see a complete document.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Utc;
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, error, info, warn};

use crate::config::RouterConfig;

/// Error type for state store operations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Write to {path} failed after {attempts} attempts: {message}")]
    WriteExhausted {
        path: PathBuf,
        attempts: u32,
        message: String,
    },

    #[error("Backup {path} unavailable: {message}")]
    BackupUnavailable { path: PathBuf, message: String },

    #[error("Store writer for {0} has shut down")]
    WriterClosed(PathBuf),
}

impl StoreError {
    /// Whether this is the repeated-write-failure case callers may want to alert on
    pub fn is_write_exhausted(&self) -> bool {
        matches!(self, Self::WriteExhausted { .. })
    }
}

/// Result type for state store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// A document that can live in a [`JsonStore`].
///
/// `validate` is the schema hook applied on every read; a document that
/// deserializes but fails validation is quarantined like a parse failure.
pub trait StoreState:
    Serialize + DeserializeOwned + Default + Clone + Send + Sync + 'static
{
    fn validate(&self) -> Result<(), String> {
        Ok(())
    }
}

/// Path next to `path` with `suffix` appended to the file name
pub(crate) fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(suffix);
    path.with_file_name(name)
}

/// JSON document persisted at a single path
#[derive(Debug, Clone)]
pub struct JsonStore<T> {
    path: PathBuf,
    default: T,
    backup_generations: usize,
    max_bytes: u64,
    write_retries: u32,
    retry_backoff: Duration,
}

impl<T: StoreState> JsonStore<T> {
    /// Store at `path` returning `T::default()` when nothing valid is on disk
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            default: T::default(),
            backup_generations: 3,
            max_bytes: 5 * 1024 * 1024,
            write_retries: 3,
            retry_backoff: Duration::from_millis(50),
        }
    }

    /// Store at `path` using the limits from `config`
    pub fn from_config(path: impl Into<PathBuf>, config: &RouterConfig) -> Self {
        Self::new(path)
            .with_backups(config.backup_generations)
            .with_max_bytes(config.max_store_bytes)
            .with_write_retries(config.write_retries)
    }

    /// Replace the safe default returned when the file is unusable
    pub fn with_default(mut self, default: T) -> Self {
        self.default = default;
        self
    }

    pub fn with_backups(mut self, generations: usize) -> Self {
        self.backup_generations = generations;
        self
    }

    pub fn with_max_bytes(mut self, max_bytes: u64) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    pub fn with_write_retries(mut self, attempts: u32) -> Self {
        self.write_retries = attempts.max(1);
        self
    }

    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path of rotated generation `n` (1 is the newest)
    pub fn backup_path(&self, generation: usize) -> PathBuf {
        sibling(&self.path, &format!(".bak.{}", generation))
    }

    /// Load the last valid state, or the default
    pub fn read(&self) -> T {
        let meta = match fs::metadata(&self.path) {
            Ok(meta) => meta,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return self.default.clone(),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Store unreadable, using default");
                return self.default.clone();
            }
        };

        if meta.len() > self.max_bytes {
            self.quarantine(&format!(
                "size {} exceeds limit {}",
                meta.len(),
                self.max_bytes
            ));
            return self.default.clone();
        }

        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Store unreadable, using default");
                return self.default.clone();
            }
        };

        if bytes.iter().all(|b| b.is_ascii_whitespace()) {
            return self.default.clone();
        }

        match serde_json::from_slice::<T>(&bytes) {
            Ok(state) => match state.validate() {
                Ok(()) => state,
                Err(reason) => {
                    self.quarantine(&format!("schema violation: {}", reason));
                    self.default.clone()
                }
            },
            Err(e) => {
                self.quarantine(&format!("parse error: {}", e));
                self.default.clone()
            }
        }
    }

    /// Persist `state` atomically, rotating backups first.
    ///
    /// Retries up to the configured attempt count and then reports
    /// [`StoreError::WriteExhausted`].
    pub fn write(&self, state: &T) -> StoreResult<()> {
        let bytes =
            serde_json::to_vec_pretty(state).map_err(|e| StoreError::Serialization(e.to_string()))?;

        self.rotate_backups();

        let mut last_error = String::new();
        for attempt in 1..=self.write_retries {
            match self.write_once(&bytes) {
                Ok(()) => {
                    debug!(path = %self.path.display(), bytes = bytes.len(), "Store written");
                    return Ok(());
                }
                Err(e) => {
                    warn!(
                        path = %self.path.display(),
                        attempt,
                        error = %e,
                        "Store write failed"
                    );
                    last_error = e.to_string();
                    if attempt < self.write_retries {
                        std::thread::sleep(self.retry_backoff * attempt);
                    }
                }
            }
        }

        error!(path = %self.path.display(), attempts = self.write_retries, "Store write exhausted");
        Err(StoreError::WriteExhausted {
            path: self.path.clone(),
            attempts: self.write_retries,
            message: last_error,
        })
    }

    /// Put rotated generation `n` back in place and return it
    pub fn restore_backup(&self, generation: usize) -> StoreResult<T> {
        let state = self.load_backup(generation)?;
        self.write(&state)?;
        info!(path = %self.path.display(), generation, "Restored store from backup");
        Ok(state)
    }

    /// Parse and validate rotated generation `n` without touching the live file
    pub fn load_backup(&self, generation: usize) -> StoreResult<T> {
        let backup = self.backup_path(generation);
        let bytes = fs::read(&backup).map_err(|e| StoreError::BackupUnavailable {
            path: backup.clone(),
            message: e.to_string(),
        })?;
        let state: T =
            serde_json::from_slice(&bytes).map_err(|e| StoreError::BackupUnavailable {
                path: backup.clone(),
                message: e.to_string(),
            })?;
        state
            .validate()
            .map_err(|message| StoreError::BackupUnavailable {
                path: backup.clone(),
                message,
            })?;
        Ok(state)
    }

    /// Whether the backing location can be read and written
    pub fn probe(&self) -> bool {
        if let Some(parent) = self.parent_dir() {
            if fs::create_dir_all(parent).is_err() {
                return false;
            }
        }
        if self.path.exists() && fs::metadata(&self.path).is_err() {
            return false;
        }
        let probe = sibling(&self.path, ".probe");
        let ok = fs::write(&probe, b"ok").is_ok();
        let _ = fs::remove_file(&probe);
        ok
    }

    fn parent_dir(&self) -> Option<&Path> {
        self.path.parent().filter(|p| !p.as_os_str().is_empty())
    }

    fn write_once(&self, bytes: &[u8]) -> std::io::Result<()> {
        if let Some(parent) = self.parent_dir() {
            fs::create_dir_all(parent)?;
        }

        let temp_path = sibling(&self.path, ".tmp");
        let result = (|| {
            let mut file = File::create(&temp_path)?;
            file.write_all(bytes)?;
            file.sync_all()?;
            drop(file);

            if let Err(e) = fs::rename(&temp_path, &self.path) {
                debug!(path = %self.path.display(), error = %e, "Rename failed, copying instead");
                fs::copy(&temp_path, &self.path)?;
                fs::remove_file(&temp_path)?;
            }
            Ok(())
        })();

        if result.is_err() {
            let _ = fs::remove_file(&temp_path);
        }
        result
    }

    fn rotate_backups(&self) {
        if self.backup_generations == 0 || !self.path.is_file() {
            return;
        }

        for generation in (1..self.backup_generations).rev() {
            let from = self.backup_path(generation);
            if from.exists() {
                if let Err(e) = fs::rename(&from, self.backup_path(generation + 1)) {
                    warn!(path = %from.display(), error = %e, "Backup rotation failed");
                }
            }
        }

        if let Err(e) = fs::copy(&self.path, self.backup_path(1)) {
            warn!(path = %self.path.display(), error = %e, "Failed to create backup");
        }
    }

    fn quarantine(&self, reason: &str) {
        let stamp = Utc::now().format("%Y%m%dT%H%M%S%.3fZ");
        let target = sibling(&self.path, &format!(".corrupt-{}", stamp));

        let moved = fs::rename(&self.path, &target).or_else(|_| {
            fs::copy(&self.path, &target)?;
            fs::remove_file(&self.path)
        });

        match moved {
            Ok(()) => warn!(
                path = %self.path.display(),
                quarantine = %target.display(),
                reason,
                "Quarantined invalid store file"
            ),
            Err(e) => error!(
                path = %self.path.display(),
                reason,
                error = %e,
                "Failed to quarantine invalid store file"
            ),
        }
    }
}
