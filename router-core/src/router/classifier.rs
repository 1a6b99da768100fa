//! Deterministic two-tier intent classifier.
//!
//! The primary table is scanned first, in table order, and the first
//! keyword found anywhere in the lowercased query wins. Only when nothing
//! primary matches is the broader loose table scanned. No match at all
//! routes to the general agent.

use serde::{Deserialize, Serialize};

use crate::state::GENERAL_AGENT;

/// Which table produced a classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchTier {
    /// Primary keyword table
    Keyword,
    /// Loose, lower-precision table
    Embedding,
    /// Nothing matched; routed to general
    None,
}

impl std::fmt::Display for MatchTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MatchTier::Keyword => write!(f, "keyword"),
            MatchTier::Embedding => write!(f, "embedding"),
            MatchTier::None => write!(f, "none"),
        }
    }
}

/// Result of classifying one query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    pub agent: String,
    pub matched_keyword: Option<String>,
    pub tier: MatchTier,
}

impl Classification {
    fn general() -> Self {
        Self {
            agent: GENERAL_AGENT.to_string(),
            matched_keyword: None,
            tier: MatchTier::None,
        }
    }
}

/// Ordered `(agent, keywords)` table
pub type KeywordTable = Vec<(String, Vec<String>)>;

const PRIMARY: &[(&str, &[&str])] = &[
    ("finance", &["finance", "budget", "invoice"]),
    ("home_automation", &["garage", "light", "scene", "home"]),
    ("security", &["alarm", "secure", "security"]),
    ("daily_briefing", &["briefing", "schedule", "agenda"]),
];

const LOOSE: &[(&str, &[&str])] = &[
    ("finance", &["money", "bill", "bank", "expense", "spend"]),
    (
        "home_automation",
        &["lamp", "thermostat", "door", "temperature", "kitchen"],
    ),
    ("security", &["camera", "intruder", "lock", "alert"]),
    (
        "daily_briefing",
        &["today", "morning", "calendar", "news", "weather"],
    ),
];

fn owned_table(table: &[(&str, &[&str])]) -> KeywordTable {
    table
        .iter()
        .map(|(agent, keywords)| {
            (
                agent.to_string(),
                keywords.iter().map(|k| k.to_lowercase()).collect(),
            )
        })
        .collect()
}

/// Keyword classifier mapping a query to an agent name
#[derive(Debug, Clone)]
pub struct IntentClassifier {
    primary: KeywordTable,
    loose: KeywordTable,
}

impl Default for IntentClassifier {
    fn default() -> Self {
        Self {
            primary: owned_table(PRIMARY),
            loose: owned_table(LOOSE),
        }
    }
}

impl IntentClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Classifier with custom tables. Keywords are lowercased.
    pub fn with_tables(primary: KeywordTable, loose: KeywordTable) -> Self {
        let lower = |table: KeywordTable| -> KeywordTable {
            table
                .into_iter()
                .map(|(agent, kws)| (agent, kws.iter().map(|k| k.to_lowercase()).collect()))
                .collect()
        };
        Self {
            primary: lower(primary),
            loose: lower(loose),
        }
    }

    /// Agent name for `query`
    pub fn classify(&self, query: &str) -> String {
        self.classify_detailed(query).agent
    }

    /// Agent name plus the keyword and tier that selected it
    pub fn classify_detailed(&self, query: &str) -> Classification {
        let lower = query.to_lowercase();
        for (table, tier) in [
            (&self.primary, MatchTier::Keyword),
            (&self.loose, MatchTier::Embedding),
        ] {
            if let Some((agent, keyword)) = scan(table, &lower) {
                return Classification {
                    agent: agent.to_string(),
                    matched_keyword: Some(keyword.to_string()),
                    tier,
                };
            }
        }
        Classification::general()
    }

    /// Every agent named in either table
    pub fn agents(&self) -> Vec<String> {
        let mut agents: Vec<String> = Vec::new();
        for (agent, _) in self.primary.iter().chain(self.loose.iter()) {
            if !agents.contains(agent) {
                agents.push(agent.clone());
            }
        }
        agents
    }
}

fn scan<'a>(table: &'a KeywordTable, query: &str) -> Option<(&'a str, &'a str)> {
    table.iter().find_map(|(agent, keywords)| {
        keywords
            .iter()
            .find(|k| !k.is_empty() && query.contains(k.as_str()))
            .map(|k| (agent.as_str(), k.as_str()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primary_keyword_match() {
        let c = IntentClassifier::new().classify_detailed("Show my BUDGET please");
        assert_eq!(c.agent, "finance");
        assert_eq!(c.matched_keyword.as_deref(), Some("budget"));
        assert_eq!(c.tier, MatchTier::Keyword);
    }

    #[test]
    fn test_table_order_beats_query_order() {
        // "alarm" appears first in the query but finance precedes security
        let c = IntentClassifier::new().classify_detailed("alarm on the invoice");
        assert_eq!(c.agent, "finance");
        assert_eq!(c.matched_keyword.as_deref(), Some("invoice"));
    }

    #[test]
    fn test_primary_wins_over_loose() {
        // "kitchen" is loose home_automation, "light" is primary
        let c = IntentClassifier::new().classify_detailed("toggle kitchen light");
        assert_eq!(c.agent, "home_automation");
        assert_eq!(c.matched_keyword.as_deref(), Some("light"));
        assert_eq!(c.tier, MatchTier::Keyword);
    }

    #[test]
    fn test_loose_tier() {
        let c = IntentClassifier::new().classify_detailed("what's the weather");
        assert_eq!(c.agent, "daily_briefing");
        assert_eq!(c.tier, MatchTier::Embedding);
    }

    #[test]
    fn test_no_match_is_general() {
        let c = IntentClassifier::new().classify_detailed("tell me a joke");
        assert_eq!(c.agent, GENERAL_AGENT);
        assert_eq!(c.matched_keyword, None);
        assert_eq!(c.tier, MatchTier::None);
    }

    #[test]
    fn test_custom_tables_are_case_insensitive() {
        let classifier = IntentClassifier::with_tables(
            vec![("garden".to_string(), vec!["Sprinkler".to_string()])],
            vec![],
        );
        assert_eq!(classifier.classify("turn on the SPRINKLER"), "garden");
        assert_eq!(classifier.classify("budget"), GENERAL_AGENT);
    }

    #[test]
    fn test_agents_listed_once_in_order() {
        assert_eq!(
            IntentClassifier::new().agents(),
            vec!["finance", "home_automation", "security", "daily_briefing"]
        );
    }
}
