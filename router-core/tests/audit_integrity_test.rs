//! Tamper detection on the hash-chained audit log

use std::fs::{self, OpenOptions};

use router_core::escalation::{digest_bytes, AuditLog};
use router_core::{EscalationEngine, RouterConfig};
use serde_json::json;
use tempfile::tempdir;

#[tokio::test]
async fn escalations_keep_the_log_verifiable() {
    let dir = tempdir().unwrap();
    let engine = EscalationEngine::from_config(&RouterConfig::rooted_at(dir.path()));

    for scene in ["wake_up", "movie_night", "leave_home"] {
        let record = engine.escalate_scene(scene, "low confidence").await;
        assert!(record.audit_digest.is_some());
    }

    assert!(engine.verify_audit());
    let entries = engine.audit().entries().unwrap();
    assert_eq!(entries.len(), 3);
    assert_eq!(entries[1].prev_digest, prefix_digest(&engine, 1));
}

fn prefix_digest(engine: &EscalationEngine, lines: usize) -> String {
    let raw = fs::read(engine.audit().log_path()).unwrap();
    let mut end = 0;
    for _ in 0..lines {
        end += raw[end..].iter().position(|b| *b == b'\n').unwrap() + 1;
    }
    digest_bytes(&raw[..end])
}

#[test]
fn truncating_one_byte_fails_verification() {
    let dir = tempdir().unwrap();
    let log = AuditLog::new(dir.path().join("audit.jsonl"), dir.path().join("audit.sha256"));
    log.append("escalation", json!({"scene": "s1"})).unwrap();
    log.append("escalation", json!({"scene": "s2"})).unwrap();
    assert!(log.verify_digest());

    let len = fs::metadata(log.log_path()).unwrap().len();
    OpenOptions::new()
        .write(true)
        .open(log.log_path())
        .unwrap()
        .set_len(len - 1)
        .unwrap();

    assert!(!log.verify_digest());
    assert!(!log.verify_chain());
}

#[test]
fn missing_digest_file_fails_verification() {
    let dir = tempdir().unwrap();
    let log = AuditLog::new(dir.path().join("audit.jsonl"), dir.path().join("audit.sha256"));
    log.append("escalation", json!({"scene": "s1"})).unwrap();

    fs::remove_file(log.digest_path()).unwrap();

    assert!(!log.verify_digest());
}

#[test]
fn fresh_install_without_escalations_verifies() {
    let dir = tempdir().unwrap();
    let engine = EscalationEngine::from_config(&RouterConfig::rooted_at(dir.path()));

    assert!(!engine.audit().log_path().exists());
    assert!(engine.verify_audit());
    assert!(engine.audit().entries().unwrap().is_empty());
}
