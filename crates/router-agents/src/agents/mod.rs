//! Concrete agent handlers
//!
//! ```text
//! DispatchTable
//!   ├─ general          (language model, never fails)
//!   ├─ finance          ─┐
//!   ├─ security          ├─ static specialists
//!   ├─ daily_briefing   ─┘
//!   └─ home_automation  (scene phrases, reports `status`)
//! ```

pub mod general;
pub mod home;
pub mod specialists;

use std::sync::Arc;
use std::time::Duration;

use router_core::{DispatchTable, TextCompletion};

pub use general::GeneralAgent;
pub use home::HomeAutomationAgent;
pub use specialists::SpecialistAgent;

/// Dispatch table with every built-in agent, `general` backed by `completion`
pub fn build_dispatch_table(
    completion: Arc<dyn TextCompletion>,
    timeout: Duration,
) -> DispatchTable {
    DispatchTable::new(Arc::new(GeneralAgent::new(completion)))
        .with_timeout(timeout)
        .register(Arc::new(SpecialistAgent::finance()))
        .register(Arc::new(HomeAutomationAgent::new()))
        .register(Arc::new(SpecialistAgent::security()))
        .register(Arc::new(SpecialistAgent::daily_briefing()))
}
