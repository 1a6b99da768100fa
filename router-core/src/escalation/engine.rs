//! Escalation engine
//!
//! Marks scenes as escalated, writes the audit trail and evaluates the
//! uncertainty and trust thresholds. Escalation never fails: the status
//! update happens first, and a failed audit append only costs the record
//! its digest.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::RouterConfig;

use super::audit::AuditLog;
use super::scenes::{SceneTracker, STATUS_ESCALATED};

/// Audit action recorded for an escalation
pub const ESCALATION_ACTION: &str = "escalation";

/// Immutable record of one escalation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EscalationRecord {
    pub id: Uuid,
    pub scene_id: String,
    pub reason: String,
    pub timestamp: DateTime<Utc>,
    /// Audit digest after this record was appended; `None` if the append failed
    pub audit_digest: Option<String>,
}

/// Escalation thresholds
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EscalationThresholds {
    /// Confidence below this escalates
    pub uncertainty: f64,
    /// Trust below this escalates
    pub trust: f64,
}

impl Default for EscalationThresholds {
    fn default() -> Self {
        Self {
            uncertainty: 0.3,
            trust: 0.5,
        }
    }
}

impl EscalationThresholds {
    pub fn from_config(config: &RouterConfig) -> Self {
        Self {
            uncertainty: config.uncertainty_threshold,
            trust: config.trust_threshold,
        }
    }
}

/// Shared reference to the escalation engine
pub type SharedEscalationEngine = Arc<EscalationEngine>;

pub struct EscalationEngine {
    scenes: SceneTracker,
    audit: Arc<AuditLog>,
    thresholds: EscalationThresholds,
}

impl EscalationEngine {
    pub fn new(scenes: SceneTracker, audit: AuditLog, thresholds: EscalationThresholds) -> Self {
        Self {
            scenes,
            audit: Arc::new(audit),
            thresholds,
        }
    }

    pub fn from_config(config: &RouterConfig) -> Self {
        Self::new(
            SceneTracker::from_config(config),
            AuditLog::from_config(config),
            EscalationThresholds::from_config(config),
        )
    }

    pub fn shared(self) -> SharedEscalationEngine {
        Arc::new(self)
    }

    pub fn scenes(&self) -> &SceneTracker {
        &self.scenes
    }

    pub fn audit(&self) -> &AuditLog {
        &self.audit
    }

    pub fn thresholds(&self) -> EscalationThresholds {
        self.thresholds
    }

    /// True when either the confidence or the trust floor is breached
    pub fn should_escalate(&self, confidence: f64, trust_weight: f64) -> bool {
        confidence < self.thresholds.uncertainty || trust_weight < self.thresholds.trust
    }

    /// Mark `scene_id` escalated and append the audit entry
    pub async fn escalate_scene(&self, scene_id: &str, reason: &str) -> EscalationRecord {
        let timestamp = Utc::now();

        if let Err(e) = self.scenes.update_status(scene_id, STATUS_ESCALATED).await {
            error!(scene = scene_id, error = %e, "Failed to persist escalated status");
        }

        let payload = json!({
            "scene": scene_id,
            "reason": reason,
            "timestamp": timestamp,
        });
        let audit_digest = self.record_event(ESCALATION_ACTION, payload).await;

        info!(scene = scene_id, reason, "Scene escalated");
        EscalationRecord {
            id: Uuid::new_v4(),
            scene_id: scene_id.to_string(),
            reason: reason.to_string(),
            timestamp,
            audit_digest,
        }
    }

    /// Append an arbitrary audit entry; failures are logged, not returned.
    ///
    /// The append (read, fsync, rehash) runs on the blocking pool.
    pub async fn record_event(&self, action: &str, payload: Value) -> Option<String> {
        let audit = Arc::clone(&self.audit);
        let owned = action.to_string();
        match tokio::task::spawn_blocking(move || audit.append(&owned, payload)).await {
            Ok(Ok(digest)) => Some(digest),
            Ok(Err(e)) => {
                error!(action, error = %e, "Failed to append audit entry");
                None
            }
            Err(e) => {
                error!(action, error = %e, "Audit append task failed");
                None
            }
        }
    }

    /// Audit digest and chain both intact
    pub fn verify_audit(&self) -> bool {
        let ok = self.audit.verify_chain();
        if !ok {
            warn!(path = %self.audit.log_path().display(), "Audit verification failed");
        }
        ok
    }

    pub fn probe(&self) -> bool {
        self.scenes.probe()
    }
}
