//! The invoker seam and its error type.

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

/// Why a tool call produced no payload.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("tool '{0}' is not registered")]
    NotFound(String),

    /// The tool ran and reported a failure.
    #[error("{0}")]
    Failed(String),

    #[error("tool '{tool}' timed out after {secs}s")]
    Timeout { tool: String, secs: u64 },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The tool server answered with a non-success status.
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },
}

impl ToolError {
    pub fn failed(message: impl Into<String>) -> Self {
        ToolError::Failed(message.into())
    }
}

/// Executes a named tool with JSON arguments and returns its text payload.
#[async_trait]
pub trait ToolInvoker: Send + Sync {
    async fn invoke(&self, name: &str, args: &Value) -> Result<String, ToolError>;
}
