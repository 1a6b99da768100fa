//! Persisted scene status map `{scene: status}`

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::RouterConfig;
use crate::state::{JsonStore, StoreHandle, StoreResult, StoreState};

pub const STATUS_ESCALATED: &str = "escalated";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SceneStatusFile(pub BTreeMap<String, String>);

impl StoreState for SceneStatusFile {}

/// Status per scene or task id
#[derive(Clone)]
pub struct SceneTracker {
    store: StoreHandle<SceneStatusFile>,
}

impl SceneTracker {
    pub fn new(store: JsonStore<SceneStatusFile>) -> Self {
        Self {
            store: StoreHandle::spawn(store),
        }
    }

    pub fn from_config(config: &RouterConfig) -> Self {
        Self::new(JsonStore::from_config(&config.scene_status_path, config))
    }

    pub async fn update_status(&self, scene_id: &str, status: &str) -> StoreResult<()> {
        debug!(scene = scene_id, status, "Updating scene status");
        let (scene, status) = (scene_id.to_string(), status.to_string());
        self.store
            .update(move |file| {
                file.0.insert(scene, status);
            })
            .await
    }

    pub async fn status(&self, scene_id: &str) -> StoreResult<Option<String>> {
        Ok(self.store.read().await?.0.get(scene_id).cloned())
    }

    pub async fn all_statuses(&self) -> StoreResult<BTreeMap<String, String>> {
        Ok(self.store.read().await?.0)
    }

    pub fn probe(&self) -> bool {
        self.store.probe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_update_and_read_status() {
        let dir = tempdir().unwrap();
        let tracker = SceneTracker::new(JsonStore::new(dir.path().join("scenes.json")));

        assert_eq!(tracker.status("movie_night").await.unwrap(), None);
        tracker
            .update_status("movie_night", STATUS_ESCALATED)
            .await
            .unwrap();
        tracker.update_status("wake_up", "done").await.unwrap();

        assert_eq!(
            tracker.status("movie_night").await.unwrap().as_deref(),
            Some(STATUS_ESCALATED)
        );
        assert_eq!(tracker.all_statuses().await.unwrap().len(), 2);
    }
}
