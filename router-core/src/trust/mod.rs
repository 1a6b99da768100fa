//! Agent trust
//!
//! - [`TrustRegistry`]: durable weights in `[0, 1]`, clamped on every path
//! - [`PredictiveLedger`]: rolling one-hour success ratio per agent

pub mod predictive;
pub mod registry;

pub use predictive::{PredictiveLedger, DEFAULT_WINDOW_SECS, NEUTRAL_TRUST};
pub use registry::{
    clamp_trust, SharedTrustRegistry, TrustEntry, TrustFile, TrustRegistry, TrustSnapshot,
};
