//! Concrete agents for the router
//!
//! - `agents`: finance, home automation, security, daily briefing and the
//!   general fallback, assembled into a [`router_core::DispatchTable`]
//! - `completion`: OpenAI-compatible chat completion backend
//! - `config`: language-model endpoint settings from the environment

pub mod agents;
pub mod completion;
pub mod config;

pub use agents::build_dispatch_table;
pub use completion::{check_endpoint, OpenAiCompletion, UnavailableCompletion};
pub use config::{AgentsConfig, LlmEndpoint};
