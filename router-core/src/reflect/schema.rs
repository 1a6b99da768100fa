//! Per-agent result contracts

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::config::RouterConfig;
use crate::dispatch::AgentOutput;
use crate::state::{JsonStore, StoreHandle, StoreResult, StoreState};

/// Expected shape of one agent's output
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentSchema {
    /// Fields that must be present
    #[serde(default)]
    pub expected_keys: Vec<String>,

    /// Value the success field must hold; `null` disables the check
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success_value: Option<Value>,

    /// Field compared against `success_value`; defaults to the first expected key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success_key: Option<String>,
}

impl AgentSchema {
    pub fn requiring<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            expected_keys: keys.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    pub fn with_success_value(mut self, value: impl Into<Value>) -> Self {
        self.success_value = Some(value.into());
        self
    }

    pub fn with_success_key(mut self, key: impl Into<String>) -> Self {
        self.success_key = Some(key.into());
        self
    }

    /// Why `output` violates this contract, if it does
    pub fn violation(&self, output: &AgentOutput) -> Option<String> {
        if let Some(missing) = self
            .expected_keys
            .iter()
            .find(|key| output.field(key).is_none())
        {
            return Some(format!("missing field '{}'", missing));
        }

        let expected = self.success_value.as_ref()?;
        let key = self
            .success_key
            .as_ref()
            .or_else(|| self.expected_keys.first())?;
        match output.field(key) {
            Some(actual) if &actual == expected => None,
            Some(actual) => Some(format!(
                "field '{}' is {} but must be {}",
                key, actual, expected
            )),
            None => Some(format!("missing field '{}'", key)),
        }
    }

    pub fn accepts(&self, output: &AgentOutput) -> bool {
        self.violation(output).is_none()
    }
}

/// Contracts document `{agent: schema}`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SchemaBook(pub BTreeMap<String, AgentSchema>);

impl SchemaBook {
    /// Contracts used when no contracts file exists
    pub fn builtin() -> Self {
        let mut book = BTreeMap::new();
        book.insert(
            "home_automation".to_string(),
            AgentSchema::requiring(["status"]).with_success_value("ok"),
        );
        Self(book)
    }
}

impl StoreState for SchemaBook {}

/// Persisted contracts, read on every check
#[derive(Clone)]
pub struct ContractRegistry {
    store: StoreHandle<SchemaBook>,
}

impl ContractRegistry {
    pub fn new(store: JsonStore<SchemaBook>) -> Self {
        Self {
            store: StoreHandle::spawn(store.with_default(SchemaBook::builtin())),
        }
    }

    pub fn from_config(config: &RouterConfig) -> Self {
        Self::new(JsonStore::from_config(&config.schema_path, config))
    }

    /// Contract for `agent`, if any
    pub async fn get(&self, agent: &str) -> StoreResult<Option<AgentSchema>> {
        Ok(self.store.read().await?.0.get(agent).cloned())
    }

    pub async fn all(&self) -> StoreResult<SchemaBook> {
        self.store.read().await
    }

    /// Add or replace the contract for `agent`
    pub async fn register(&self, agent: &str, schema: AgentSchema) -> StoreResult<()> {
        let owned = agent.to_string();
        self.store
            .update(move |book| {
                book.0.insert(owned, schema);
            })
            .await?;
        info!(agent, "Registered result contract");
        Ok(())
    }

    /// Drop the contract for `agent`; true if one existed
    pub async fn remove(&self, agent: &str) -> StoreResult<bool> {
        let owned = agent.to_string();
        self.store
            .update(move |book| book.0.remove(&owned).is_some())
            .await
    }

    /// Whether `output` satisfies `agent`'s contract. No contract means yes.
    pub async fn check(&self, agent: &str, output: &AgentOutput) -> StoreResult<bool> {
        let Some(schema) = self.get(agent).await? else {
            return Ok(true);
        };
        match schema.violation(output) {
            Some(reason) => {
                debug!(agent, reason = %reason, "Result contract violated");
                Ok(false)
            }
            None => Ok(true),
        }
    }

    pub fn probe(&self) -> bool {
        self.store.probe()
    }
}
