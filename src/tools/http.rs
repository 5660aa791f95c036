//! HTTP tool invoker.
//!
//! Each call is `POST {base_url}/tools/{name}` with the arguments as the
//! JSON body. The response body is the payload; any non-2xx status is a
//! tool error carrying the body text.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use super::invoker::{ToolError, ToolInvoker};

/// Environment variable holding the tool server base URL.
pub const TOOLS_URL_ENV: &str = "ESTATEWISE_TOOLS_URL";
pub const DEFAULT_TOOLS_URL: &str = "http://localhost:4100";

/// Client-side request timeout. Per-step timeouts are applied by the
/// executor on top of this.
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Clone)]
pub struct HttpToolInvoker {
    base_url: String,
    client: reqwest::Client,
}

impl HttpToolInvoker {
    pub fn new(base_url: impl Into<String>) -> Result<Self, ToolError> {
        Self::with_timeout(base_url, Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS))
    }

    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ToolError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    /// Invoker for `ESTATEWISE_TOOLS_URL`, or the local default.
    pub fn from_env() -> Result<Self, ToolError> {
        let base = std::env::var(TOOLS_URL_ENV)
            .ok()
            .filter(|url| !url.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_TOOLS_URL.to_string());
        Self::new(base)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn endpoint(&self, name: &str) -> String {
        format!("{}/tools/{}", self.base_url, name)
    }
}

#[async_trait]
impl ToolInvoker for HttpToolInvoker {
    async fn invoke(&self, name: &str, args: &Value) -> Result<String, ToolError> {
        let url = self.endpoint(name);
        log::debug!("HttpToolInvoker: POST {}", url);

        let resp = self.client.post(&url).json(args).send().await?;
        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            log::warn!("HttpToolInvoker: {} answered HTTP {}", url, status);
            return Err(ToolError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(body)
    }
}
