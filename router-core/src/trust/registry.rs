//! Durable per-agent trust weights
//!
//! Two documents are kept in step: the durable weight file
//! `{agent: {trust, type?}}` and a flat snapshot `{agent: trust}` that
//! mirrors the in-memory cache. Every mutation writes both while holding
//! the cache lock, so the snapshot never lags behind a newer durable value.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::config::RouterConfig;
use crate::state::{JsonStore, StoreHandle, StoreResult, StoreState};

/// Clamp a weight into `[0.0, 1.0]`; NaN collapses to 0.0
pub fn clamp_trust(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// Stored trust for one agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawTrustEntry")]
pub struct TrustEntry {
    pub trust: f64,

    /// Optional role label, preserved across weight updates
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

impl TrustEntry {
    pub fn new(trust: f64) -> Self {
        Self {
            trust: clamp_trust(trust),
            role: None,
        }
    }
}

/// Older files store a bare number per agent
#[derive(Deserialize)]
#[serde(untagged)]
enum RawTrustEntry {
    Full {
        #[serde(default)]
        trust: f64,
        #[serde(rename = "type", default)]
        role: Option<String>,
    },
    Bare(f64),
}

impl From<RawTrustEntry> for TrustEntry {
    fn from(raw: RawTrustEntry) -> Self {
        match raw {
            RawTrustEntry::Full { trust, role } => Self {
                trust: clamp_trust(trust),
                role,
            },
            RawTrustEntry::Bare(trust) => Self::new(trust),
        }
    }
}

/// Durable weight document, keys in sorted order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrustFile(pub BTreeMap<String, TrustEntry>);

impl TrustFile {
    pub fn weights(&self) -> BTreeMap<String, f64> {
        self.0
            .iter()
            .map(|(agent, entry)| (agent.clone(), entry.trust))
            .collect()
    }

    fn set(&mut self, agent: &str, trust: f64) -> f64 {
        let value = clamp_trust(trust);
        self.0
            .entry(agent.to_string())
            .and_modify(|entry| entry.trust = value)
            .or_insert_with(|| TrustEntry::new(value));
        value
    }
}

impl StoreState for TrustFile {
    fn validate(&self) -> Result<(), String> {
        if self.0.keys().any(|agent| agent.trim().is_empty()) {
            return Err("empty agent name".to_string());
        }
        Ok(())
    }
}

/// Fast-read snapshot of the current weights
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrustSnapshot(pub BTreeMap<String, f64>);

impl StoreState for TrustSnapshot {
    fn validate(&self) -> Result<(), String> {
        match self
            .0
            .iter()
            .find(|(_, w)| !(0.0..=1.0).contains(*w))
        {
            Some((agent, weight)) => Err(format!("weight {} for '{}' out of range", weight, agent)),
            None => Ok(()),
        }
    }
}

/// Shared reference to the trust registry
pub type SharedTrustRegistry = Arc<TrustRegistry>;

/// Per-agent trust weights with durable and snapshot persistence
pub struct TrustRegistry {
    durable: StoreHandle<TrustFile>,
    snapshot: StoreHandle<TrustSnapshot>,
    cache: RwLock<BTreeMap<String, f64>>,
}

impl TrustRegistry {
    /// Open both documents and warm the cache from the snapshot
    pub async fn open(
        durable: JsonStore<TrustFile>,
        snapshot: JsonStore<TrustSnapshot>,
    ) -> StoreResult<Self> {
        let registry = Self {
            durable: StoreHandle::spawn(durable),
            snapshot: StoreHandle::spawn(snapshot),
            cache: RwLock::new(BTreeMap::new()),
        };
        registry.load_snapshot().await?;
        Ok(registry)
    }

    /// Open the files named in `config`
    pub async fn from_config(config: &RouterConfig) -> StoreResult<Self> {
        Self::open(
            JsonStore::from_config(&config.trust_path, config),
            JsonStore::from_config(&config.trust_snapshot_path, config),
        )
        .await
    }

    /// Create a shared reference to this registry
    pub fn shared(self) -> SharedTrustRegistry {
        Arc::new(self)
    }

    /// Weights from the durable file
    pub async fn load(&self) -> StoreResult<BTreeMap<String, f64>> {
        Ok(self.durable.read().await?.weights())
    }

    /// Durable entries including role metadata
    pub async fn entries(&self) -> StoreResult<BTreeMap<String, TrustEntry>> {
        Ok(self.durable.read().await?.0)
    }

    /// Cached weight for `agent`
    pub async fn weight(&self, agent: &str) -> Option<f64> {
        self.cache.read().await.get(agent).copied()
    }

    /// Cached weight, or `default` for an agent never seen
    pub async fn weight_or(&self, agent: &str, default: f64) -> f64 {
        self.weight(agent).await.unwrap_or(default)
    }

    /// Copy of the cached weights
    pub async fn snapshot(&self) -> BTreeMap<String, f64> {
        self.cache.read().await.clone()
    }

    /// Set an absolute weight, clamped. Role metadata is kept.
    pub async fn set_weight(&self, agent: &str, value: f64) -> StoreResult<f64> {
        let mut cache = self.cache.write().await;
        let owned = agent.to_string();
        let stored = self
            .durable
            .update(move |file| file.set(&owned, value))
            .await?;
        self.write_snapshot(&mut cache, agent, stored).await?;
        info!(agent, weight = stored, "Trust weight set");
        Ok(stored)
    }

    /// Add `delta` to the stored weight (0.0 if unseen), clamped
    pub async fn update_weight(&self, agent: &str, delta: f64) -> StoreResult<f64> {
        let mut cache = self.cache.write().await;
        let owned = agent.to_string();
        let stored = self
            .durable
            .update(move |file| {
                let current = file.0.get(&owned).map(|e| e.trust).unwrap_or(0.0);
                file.set(&owned, current + delta)
            })
            .await?;
        self.write_snapshot(&mut cache, agent, stored).await?;
        debug!(agent, delta, weight = stored, "Trust weight updated");
        Ok(stored)
    }

    /// Merge `weights` (and optional roles) into the durable file
    pub async fn save_weights(
        &self,
        weights: BTreeMap<String, f64>,
        types: Option<BTreeMap<String, String>>,
    ) -> StoreResult<()> {
        let mut cache = self.cache.write().await;
        let merged = self
            .durable
            .update(move |file| {
                for (agent, weight) in weights {
                    file.set(&agent, weight);
                    if let Some(role) = types.as_ref().and_then(|t| t.get(&agent)) {
                        if let Some(entry) = file.0.get_mut(&agent) {
                            entry.role = Some(role.clone());
                        }
                    }
                }
                file.weights()
            })
            .await?;

        cache.extend(merged.clone());
        self.snapshot
            .update(move |snap| snap.0.extend(merged))
            .await
    }

    /// Record a role label for `agent` without touching its weight
    pub async fn set_type(&self, agent: &str, role: &str) -> StoreResult<()> {
        let mut cache = self.cache.write().await;
        let (agent_owned, role_owned) = (agent.to_string(), role.to_string());
        let stored = self
            .durable
            .update(move |file| {
                let entry = file
                    .0
                    .entry(agent_owned)
                    .or_insert_with(|| TrustEntry::new(0.0));
                entry.role = Some(role_owned);
                entry.trust
            })
            .await?;
        self.write_snapshot(&mut cache, agent, stored).await
    }

    /// Seed `agent` with `initial` unless it already has a weight
    pub async fn ensure_agent(&self, agent: &str, initial: f64) -> StoreResult<f64> {
        let mut cache = self.cache.write().await;
        let owned = agent.to_string();
        let (stored, created) = self
            .durable
            .update(move |file| match file.0.get(&owned).map(|e| e.trust) {
                Some(trust) => (trust, false),
                None => (file.set(&owned, initial), true),
            })
            .await?;
        if created || !cache.contains_key(agent) {
            self.write_snapshot(&mut cache, agent, stored).await?;
        }
        if created {
            info!(agent, weight = stored, "Registered agent trust");
        }
        Ok(stored)
    }

    /// Reload the cache from the snapshot.
    ///
    /// An empty snapshot (never written, or quarantined as unreadable) next
    /// to a non-empty durable file is rebuilt from the durable weights.
    pub async fn load_snapshot(&self) -> StoreResult<BTreeMap<String, f64>> {
        let mut cache = self.cache.write().await;
        let mut weights = self.snapshot.read().await?.0;
        if weights.is_empty() {
            let durable = self.load().await?;
            if !durable.is_empty() {
                warn!(
                    path = %self.snapshot.path().display(),
                    agents = durable.len(),
                    "Trust snapshot empty, rebuilding from durable weights"
                );
                self.snapshot
                    .replace(TrustSnapshot(durable.clone()))
                    .await?;
                weights = durable;
            }
        }
        *cache = weights.clone();
        Ok(weights)
    }

    /// Whether both backing files are reachable
    pub fn probe(&self) -> bool {
        self.durable.probe() && self.snapshot.probe()
    }

    async fn write_snapshot(
        &self,
        cache: &mut BTreeMap<String, f64>,
        agent: &str,
        weight: f64,
    ) -> StoreResult<()> {
        // The durable value has already landed; keep the cache in step with it
        cache.insert(agent.to_string(), weight);
        let owned = agent.to_string();
        self.snapshot
            .update(move |snap| {
                snap.0.insert(owned, weight);
            })
            .await
    }
}
