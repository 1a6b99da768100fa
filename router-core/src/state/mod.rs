//! State persistence for the router
//!
//! Every persisted resource (trust weights, runtime memory, contracts,
//! scene status) is a JSON document behind a [`JsonStore`]:
//!
//! - reads fall back to a default and quarantine corrupt files
//! - writes are atomic and rotate `.bak.N` generations
//! - mutations go through a [`StoreHandle`], one writer thread per file
//!
//! # Usage
//!
//! ```ignore
//! use router_core::state::{JsonStore, RuntimeMemory, StoreHandle};
//!
//! let handle = StoreHandle::spawn(JsonStore::<RuntimeMemory>::new("runtime_memory.json"));
//! handle.update(|memory| memory.fallback_triggered = false).await?;
//! ```

pub mod history;
pub mod store;
pub mod types;
pub mod writer;

pub use history::RoutingHistory;
pub use store::{JsonStore, StoreError, StoreResult, StoreState};
pub use types::{RoutingDecision, RuntimeMemory, GENERAL_AGENT};
pub use writer::StoreHandle;
