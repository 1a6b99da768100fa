//! End-to-end routing through classifier, dispatch, reflection, trust
//! and escalation, against real files in a temp directory.

mod common;

use common::{coordinator, household_table, StaticAgent};
use router_core::escalation::STATUS_ESCALATED;
use router_core::{DispatchTable, MatchTier, RouterConfig, SelfCritiqueArbiter, TrustRegistry};
use tempfile::tempdir;

#[tokio::test]
async fn budget_query_is_answered_by_finance() {
    let dir = tempdir().unwrap();
    let coordinator = coordinator(&dir, household_table()).await;

    let response = coordinator.route("show my budget").await;

    assert_eq!(response.agent, "finance");
    assert_eq!(response.routed_agent, "finance");
    assert!(response.success);
    assert!(!response.fallback_used);
    assert!(!response.escalated);
    assert_eq!(response.tier, MatchTier::Keyword);
    assert!((response.trust - 0.8).abs() < 1e-9);

    let history = coordinator.history().entries().await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].agent, "finance");
    assert!(history[0].success);
}

#[tokio::test]
async fn home_result_without_status_falls_back_and_escalates() {
    let dir = tempdir().unwrap();
    let coordinator = coordinator(&dir, household_table()).await;

    let response = coordinator.route("toggle kitchen light").await;

    assert_eq!(response.routed_agent, "home_automation");
    assert_eq!(response.agent, "general");
    assert!(!response.success);
    assert!(response.fallback_used);
    // general answered at 0.2, under the 0.3 uncertainty threshold
    assert!(response.escalated);
    assert!((response.trust - 0.65).abs() < 1e-9);

    let memory = coordinator.history().memory().await.unwrap();
    assert_eq!(memory.last_success, Some(false));
    assert!(memory.fallback_triggered);
    assert_eq!(memory.agent_trace[0].escalated_to.as_deref(), Some("general"));

    let scenes = coordinator.escalation().scenes().all_statuses().await.unwrap();
    assert_eq!(scenes.len(), 1);
    assert!(scenes.values().all(|s| s == STATUS_ESCALATED));
    assert!(coordinator.escalation().verify_audit());
}

#[tokio::test]
async fn trust_survives_a_restart() {
    let dir = tempdir().unwrap();
    {
        let coordinator = coordinator(&dir, household_table()).await;
        coordinator.route("invoice for march").await;
        coordinator.route("toggle kitchen light").await;
    }

    let reopened = TrustRegistry::from_config(&RouterConfig::rooted_at(dir.path()))
        .await
        .unwrap();
    let weights = reopened.load().await.unwrap();
    assert!((weights["finance"] - 0.8).abs() < 1e-9);
    assert!((weights["home_automation"] - 0.65).abs() < 1e-9);
    assert!((weights["general"] - 0.75).abs() < 1e-9);
}

#[tokio::test]
async fn upstream_failure_degrades_instead_of_erroring() {
    let dir = tempdir().unwrap();
    let coordinator = coordinator(&dir, household_table()).await;

    let response = coordinator.route("is the alarm armed").await;

    assert_eq!(response.routed_agent, "security");
    assert!(response.response.contains("connection refused"));
    assert!(response.escalated);
    assert!(response.trust < 0.75);
}

#[tokio::test]
async fn unknown_intent_goes_to_general() {
    let dir = tempdir().unwrap();
    let coordinator = coordinator(&dir, household_table()).await;

    let response = coordinator.route("tell me a joke").await;

    assert_eq!(response.agent, "general");
    assert_eq!(response.tier, MatchTier::None);
    assert!(response.matched_keyword.is_none());
}

#[tokio::test]
async fn self_critique_keeps_the_more_confident_answer() {
    let dir = tempdir().unwrap();
    let table = DispatchTable::new(StaticAgent::new("general", 0.95).arc())
        .register(StaticAgent::new("finance", 0.9).arc());
    let arbiter = SelfCritiqueArbiter::new(coordinator(&dir, table).await);

    let outcome = arbiter.route_with_self_critique("show my budget").await;

    assert_eq!(outcome.chosen().agent, "general");
    assert_eq!(outcome.specialized.agent, "finance");
}

#[tokio::test]
async fn self_heal_reroutes_and_audits() {
    let dir = tempdir().unwrap();
    let coordinator = coordinator(&dir, household_table()).await;

    let report = coordinator
        .self_heal("show my budget", "finance", "timeout")
        .await;

    assert_eq!(report.rerouted_to, "general");
    assert_eq!(report.trust, 0.0);
    assert_eq!(report.escalation.reason, "finance:timeout");

    let actions: Vec<String> = coordinator
        .escalation()
        .audit()
        .entries()
        .unwrap()
        .into_iter()
        .map(|e| e.action)
        .collect();
    assert_eq!(actions, vec!["escalation", "reroute"]);
    assert!(coordinator.escalation().verify_audit());
}

#[tokio::test]
async fn repeated_bad_result_falls_back_every_time() {
    let dir = tempdir().unwrap();
    let coordinator = coordinator(&dir, household_table()).await;

    let first = coordinator.route("open the garage").await;
    let second = coordinator.route("open the garage").await;

    assert_eq!(first.response, second.response);
    assert!(first.fallback_used && second.fallback_used);

    let history = coordinator.history().entries().await.unwrap();
    assert_eq!(history.len(), 2);
    assert!(history
        .iter()
        .all(|d| !d.success && d.fallback && d.escalated_to.as_deref() == Some("general")));
}
