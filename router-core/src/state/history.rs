//! Routing history backed by runtime memory

use tracing::debug;

use super::store::StoreResult;
use super::types::{RoutingDecision, RuntimeMemory};
use super::writer::StoreHandle;

/// Bounded routing trace shared by the reflector and the CLI
#[derive(Clone)]
pub struct RoutingHistory {
    store: StoreHandle<RuntimeMemory>,
    limit: usize,
}

impl RoutingHistory {
    pub fn new(store: StoreHandle<RuntimeMemory>, limit: usize) -> Self {
        Self {
            store,
            limit: limit.max(1),
        }
    }

    /// Append one decision
    pub async fn record(&self, decision: RoutingDecision) -> StoreResult<()> {
        let limit = self.limit;
        debug!(
            agent = %decision.agent,
            success = decision.success,
            fallback = decision.fallback,
            "Recording routing decision"
        );
        self.store
            .update(move |memory| memory.record(decision, limit))
            .await
    }

    /// Full trace, oldest first
    pub async fn entries(&self) -> StoreResult<Vec<RoutingDecision>> {
        Ok(self.store.read().await?.agent_trace)
    }

    /// The last `n` decisions, oldest first
    pub async fn recent(&self, n: usize) -> StoreResult<Vec<RoutingDecision>> {
        let mut trace = self.entries().await?;
        let skip = trace.len().saturating_sub(n);
        Ok(trace.split_off(skip))
    }

    /// Whole runtime memory document
    pub async fn memory(&self) -> StoreResult<RuntimeMemory> {
        self.store.read().await
    }

    pub fn probe(&self) -> bool {
        self.store.probe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::store::JsonStore;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_recent_returns_tail() {
        let dir = tempdir().unwrap();
        let history = RoutingHistory::new(
            StoreHandle::spawn(JsonStore::new(dir.path().join("memory.json"))),
            3,
        );

        for q in ["a", "b", "c", "d"] {
            history
                .record(RoutingDecision::accepted("finance", q))
                .await
                .unwrap();
        }

        let all = history.entries().await.unwrap();
        assert_eq!(all.len(), 3);

        let tail: Vec<_> = history
            .recent(2)
            .await
            .unwrap()
            .into_iter()
            .map(|d| d.query)
            .collect();
        assert_eq!(tail, vec!["c", "d"]);
    }

    #[tokio::test]
    async fn test_history_survives_restart() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("memory.json");
        {
            let history = RoutingHistory::new(StoreHandle::spawn(JsonStore::new(&path)), 10);
            history
                .record(RoutingDecision::accepted("security", "arm alarm"))
                .await
                .unwrap();
        }

        let history = RoutingHistory::new(StoreHandle::spawn(JsonStore::new(&path)), 10);
        let entries = history.entries().await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].agent, "security");
    }
}
