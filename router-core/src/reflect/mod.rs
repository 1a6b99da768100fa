//! Result reflection
//!
//! Handler output is checked against a per-agent contract
//! (`expected_keys`, optional `success_value`). A violation swaps in the
//! general handler's answer so callers never see a malformed payload.

pub mod reflector;
pub mod schema;

pub use reflector::{Reflection, ResultReflector};
pub use schema::{AgentSchema, ContractRegistry, SchemaBook};
