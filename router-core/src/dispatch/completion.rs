//! Language-model capability used by handlers

use async_trait::async_trait;
use thiserror::Error;

/// Errors from a text completion backend
#[derive(Error, Debug)]
pub enum CompletionError {
    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Failed to parse response: {0}")]
    ParseError(String),

    #[error("Completion backend not configured: {0}")]
    NotConfigured(String),
}

pub type CompletionResult<T> = Result<T, CompletionError>;

/// `query -> text`, which may fail or time out
#[async_trait]
pub trait TextCompletion: Send + Sync {
    /// Backend identifier for logs
    fn backend(&self) -> &str;

    async fn complete(&self, query: &str) -> CompletionResult<String>;
}
