//! Escalation: scene status, threshold policy and the audit trail
//!
//! ```text
//! escalate_scene(id, reason)
//!   ├─ scene status → "escalated"      (persisted first)
//!   ├─ audit append {action, payload}  (hash-chained)
//!   └─ digest file refreshed
//! ```

pub mod audit;
pub mod engine;
pub mod scenes;

pub use audit::{digest_bytes, AuditError, AuditLog, AuditLogEntry, AuditResult};
pub use engine::{
    EscalationEngine, EscalationRecord, EscalationThresholds, SharedEscalationEngine,
    ESCALATION_ACTION,
};
pub use scenes::{SceneStatusFile, SceneTracker, STATUS_ESCALATED};
