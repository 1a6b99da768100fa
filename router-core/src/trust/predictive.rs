//! Short-window predictive trust
//!
//! Unlike the durable weight, this ledger only remembers the last window
//! of success/failure signals and is rebuilt from scratch on restart.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::Mutex;
use tracing::warn;

/// Score reported for an agent with no signals in the window
pub const NEUTRAL_TRUST: f64 = 0.5;

#[derive(Debug, Clone, Copy)]
struct Signal {
    at: DateTime<Utc>,
    positive: bool,
}

/// Rolling per-agent ledger of timestamped +/- signals
#[derive(Debug)]
pub struct PredictiveLedger {
    window: Duration,
    events: Mutex<HashMap<String, Vec<Signal>>>,
}

/// Window used when none, or an unusable one, is configured
pub const DEFAULT_WINDOW_SECS: i64 = 3600;

impl Default for PredictiveLedger {
    fn default() -> Self {
        Self::new(Duration::seconds(DEFAULT_WINDOW_SECS))
    }
}

impl PredictiveLedger {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            events: Mutex::new(HashMap::new()),
        }
    }

    /// Ledger over the last `secs` seconds. A non-positive or out-of-range
    /// value falls back to [`DEFAULT_WINDOW_SECS`].
    pub fn with_window_secs(secs: i64) -> Self {
        match Duration::try_seconds(secs).filter(|_| secs > 0) {
            Some(window) => Self::new(window),
            None => {
                warn!(
                    secs,
                    default = DEFAULT_WINDOW_SECS,
                    "Invalid ledger window, using default"
                );
                Self::default()
            }
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub async fn record_success(&self, agent: &str) {
        self.record_at(agent, true, Utc::now()).await;
    }

    pub async fn record_failure(&self, agent: &str) {
        self.record_at(agent, false, Utc::now()).await;
    }

    /// Record a signal at `at`, pruning everything outside the window
    pub async fn record_at(&self, agent: &str, positive: bool, at: DateTime<Utc>) {
        let mut events = self.events.lock().await;
        let ledger = events.entry(agent.to_string()).or_default();
        ledger.push(Signal { at, positive });
        let window = self.window;
        ledger.retain(|s| (at - s.at).abs() < window);
    }

    /// Positive share of the signals in the window, two decimals
    pub async fn calculate(&self, agent: &str) -> f64 {
        self.calculate_at(agent, Utc::now()).await
    }

    pub async fn calculate_at(&self, agent: &str, now: DateTime<Utc>) -> f64 {
        let events = self.events.lock().await;
        let Some(ledger) = events.get(agent) else {
            return NEUTRAL_TRUST;
        };

        let live: Vec<&Signal> = ledger
            .iter()
            .filter(|s| (now - s.at).abs() < self.window)
            .collect();
        if live.is_empty() {
            return NEUTRAL_TRUST;
        }

        let positives = live.iter().filter(|s| s.positive).count();
        let ratio = positives as f64 / live.len() as f64;
        (ratio * 100.0).round() / 100.0
    }

    /// Signals currently held for `agent`
    pub async fn len(&self, agent: &str) -> usize {
        self.events
            .lock()
            .await
            .get(agent)
            .map(Vec::len)
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_no_events_is_neutral() {
        let ledger = PredictiveLedger::default();
        assert_eq!(ledger.calculate("finance").await, NEUTRAL_TRUST);
    }

    #[tokio::test]
    async fn test_ratio_rounded_to_two_decimals() {
        let ledger = PredictiveLedger::default();
        ledger.record_success("finance").await;
        ledger.record_success("finance").await;
        ledger.record_failure("finance").await;

        assert_eq!(ledger.calculate("finance").await, 0.67);
    }

    #[tokio::test]
    async fn test_old_signals_are_pruned() {
        let ledger = PredictiveLedger::with_window_secs(60);
        let now = Utc::now();
        ledger
            .record_at("security", false, now - Duration::seconds(600))
            .await;
        ledger.record_at("security", true, now).await;

        assert_eq!(ledger.len("security").await, 1);
        assert_eq!(ledger.calculate_at("security", now).await, 1.0);
    }

    #[tokio::test]
    async fn test_window_expiry_without_new_signals() {
        let ledger = PredictiveLedger::with_window_secs(60);
        let now = Utc::now();
        ledger.record_at("briefing", false, now).await;

        let later = now + Duration::seconds(120);
        assert_eq!(ledger.calculate_at("briefing", later).await, NEUTRAL_TRUST);
    }

    #[test]
    fn test_unusable_window_falls_back_to_default() {
        let default = Duration::seconds(DEFAULT_WINDOW_SECS);
        assert_eq!(PredictiveLedger::with_window_secs(0).window(), default);
        assert_eq!(PredictiveLedger::with_window_secs(-5).window(), default);
        assert_eq!(PredictiveLedger::with_window_secs(i64::MAX).window(), default);
        assert_eq!(
            PredictiveLedger::with_window_secs(90).window(),
            Duration::seconds(90)
        );
    }
}
