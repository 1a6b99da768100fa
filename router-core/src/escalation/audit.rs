//! Append-only, hash-chained audit log
//!
//! Each line is one JSON [`AuditLogEntry`] whose `prev_digest` is the
//! SHA-256 of the whole file before that line was appended. A sibling
//! digest file holds the SHA-256 of the current file and is rewritten
//! after every append.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::RouterConfig;
use crate::state::store::sibling;

/// Errors from audit log operations
#[derive(Error, Debug)]
pub enum AuditError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Audit lock poisoned")]
    LockPoisoned,
}

pub type AuditResult<T> = Result<T, AuditError>;

/// One line of the audit log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditLogEntry {
    pub timestamp: DateTime<Utc>,
    pub action: String,
    /// Digest of the log before this entry
    pub prev_digest: String,
    pub payload: Value,
}

/// Hex SHA-256 of `bytes`
pub fn digest_bytes(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Audit log file plus its digest file
#[derive(Debug)]
pub struct AuditLog {
    log_path: PathBuf,
    digest_path: PathBuf,
    lock: Mutex<()>,
}

impl AuditLog {
    pub fn new(log_path: impl Into<PathBuf>, digest_path: impl Into<PathBuf>) -> Self {
        Self {
            log_path: log_path.into(),
            digest_path: digest_path.into(),
            lock: Mutex::new(()),
        }
    }

    /// Log at `config.audit_log_path`, digest next to it
    pub fn from_config(config: &RouterConfig) -> Self {
        Self::new(&config.audit_log_path, config.audit_digest_path())
    }

    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    pub fn digest_path(&self) -> &Path {
        &self.digest_path
    }

    /// Append an entry and refresh the digest; returns the new digest
    pub fn append(&self, action: &str, payload: Value) -> AuditResult<String> {
        let _guard = self.lock.lock().map_err(|_| AuditError::LockPoisoned)?;

        if let Some(parent) = self.log_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let before = read_or_empty(&self.log_path)?;
        let prev_digest = digest_bytes(&before);
        if let Ok(stored) = fs::read_to_string(&self.digest_path) {
            if stored.trim() != prev_digest {
                warn!(
                    path = %self.log_path.display(),
                    "Audit log does not match its digest before append"
                );
            }
        }

        let entry = AuditLogEntry {
            timestamp: Utc::now(),
            action: action.to_string(),
            prev_digest,
            payload,
        };
        let mut line =
            serde_json::to_vec(&entry).map_err(|e| AuditError::Serialization(e.to_string()))?;
        line.push(b'\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_path)?;
        file.write_all(&line)?;
        file.sync_all()?;
        drop(file);

        let digest = digest_bytes(&fs::read(&self.log_path)?);
        self.write_digest(&digest)?;
        debug!(action, digest = %digest, "Audit entry appended");
        Ok(digest)
    }

    /// Digest of the log as it is now; empty log hashes the empty string
    pub fn current_digest(&self) -> AuditResult<String> {
        Ok(digest_bytes(&read_or_empty(&self.log_path)?))
    }

    /// Whether the stored digest matches the log.
    ///
    /// A fresh install with neither file verifies; a log without its digest
    /// file does not.
    pub fn verify_digest(&self) -> bool {
        let (log, stored) = match (
            read_optional(&self.log_path),
            read_optional(&self.digest_path),
        ) {
            (Ok(log), Ok(stored)) => (log, stored),
            _ => return false,
        };
        match (log, stored) {
            (None, None) => true,
            (Some(_), None) => false,
            (log, Some(stored)) => {
                let digest = digest_bytes(log.as_deref().unwrap_or_default());
                String::from_utf8_lossy(&stored).trim() == digest
            }
        }
    }

    /// Digest check plus every entry's link to the bytes before it
    pub fn verify_chain(&self) -> bool {
        if !self.verify_digest() {
            return false;
        }
        let Ok(bytes) = read_or_empty(&self.log_path) else {
            return false;
        };

        let mut offset = 0;
        for line in bytes.split_inclusive(|b| *b == b'\n') {
            let expected = digest_bytes(&bytes[..offset]);
            offset += line.len();

            let text = line.strip_suffix(b"\n").unwrap_or(line);
            if text.is_empty() {
                continue;
            }
            match serde_json::from_slice::<AuditLogEntry>(text) {
                Ok(entry) if entry.prev_digest == expected => {}
                _ => return false,
            }
        }
        true
    }

    /// Every parseable entry, oldest first
    pub fn entries(&self) -> AuditResult<Vec<AuditLogEntry>> {
        let bytes = read_or_empty(&self.log_path)?;
        let mut entries = Vec::new();
        for line in bytes.split(|b| *b == b'\n').filter(|l| !l.is_empty()) {
            match serde_json::from_slice(line) {
                Ok(entry) => entries.push(entry),
                Err(e) => warn!(error = %e, "Skipping unreadable audit line"),
            }
        }
        Ok(entries)
    }

    fn write_digest(&self, digest: &str) -> AuditResult<()> {
        let temp = sibling(&self.digest_path, ".tmp");
        fs::write(&temp, digest)?;
        if fs::rename(&temp, &self.digest_path).is_err() {
            fs::copy(&temp, &self.digest_path)?;
            let _ = fs::remove_file(&temp);
        }
        Ok(())
    }
}

fn read_optional(path: &Path) -> std::io::Result<Option<Vec<u8>>> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

fn read_or_empty(path: &Path) -> std::io::Result<Vec<u8>> {
    Ok(read_optional(path)?.unwrap_or_default())
}
