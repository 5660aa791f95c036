//! In-process tool registry.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt};
use serde_json::Value;

use super::invoker::{ToolError, ToolInvoker};

/// Boxed async tool function.
pub type ToolFn = Arc<dyn Fn(Value) -> BoxFuture<'static, Result<String, ToolError>> + Send + Sync>;

/// Tools registered as closures, keyed by dotted name.
///
/// Also counts invocations per tool.
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, ToolFn>,
    invocations: Mutex<HashMap<String, u32>>,
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.names())
            .finish()
    }
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an async tool.
    pub fn register<F, Fut>(&mut self, name: impl Into<String>, func: F) -> &mut Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<String, ToolError>> + Send + 'static,
    {
        let func: ToolFn = Arc::new(move |args| func(args).boxed());
        self.tools.insert(name.into(), func);
        self
    }

    /// Register a synchronous tool.
    pub fn register_sync<F>(&mut self, name: impl Into<String>, func: F) -> &mut Self
    where
        F: Fn(&Value) -> Result<String, ToolError> + Send + Sync + 'static,
    {
        let func = Arc::new(func);
        self.register(name, move |args| {
            let func = Arc::clone(&func);
            async move { func(&args) }
        })
    }

    /// Register a tool that always answers with `value` serialized as JSON.
    pub fn register_json(&mut self, name: impl Into<String>, value: Value) -> &mut Self {
        let payload = value.to_string();
        self.register_sync(name, move |_| Ok(payload.clone()))
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tools.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// How many times `name` has been invoked, including failed attempts.
    pub fn invocation_count(&self, name: &str) -> u32 {
        self.invocations
            .lock()
            .map(|counts| counts.get(name).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    fn count(&self, name: &str) {
        if let Ok(mut counts) = self.invocations.lock() {
            *counts.entry(name.to_string()).or_insert(0) += 1;
        }
    }
}

#[async_trait]
impl ToolInvoker for ToolRegistry {
    async fn invoke(&self, name: &str, args: &Value) -> Result<String, ToolError> {
        let func = self
            .tools
            .get(name)
            .cloned()
            .ok_or_else(|| ToolError::NotFound(name.to_string()))?;
        self.count(name);
        log::debug!("ToolRegistry: invoking '{}'", name);
        func(args.clone()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_sync_and_json_tools() {
        let mut registry = ToolRegistry::new();
        registry
            .register_sync("util.echo", |args| Ok(args.to_string()))
            .register_json("properties.search", json!([1, 2, 3]));

        let echoed = tokio_test::block_on(registry.invoke("util.echo", &json!({"q": "x"}))).unwrap();
        assert_eq!(echoed, r#"{"q":"x"}"#);

        let found = tokio_test::block_on(registry.invoke("properties.search", &json!({}))).unwrap();
        assert_eq!(found, "[1,2,3]");
        assert_eq!(registry.invocation_count("properties.search"), 1);
        assert_eq!(registry.names(), vec!["properties.search", "util.echo"]);
    }

    #[tokio::test]
    async fn test_async_tool() {
        let mut registry = ToolRegistry::new();
        registry.register("finance.mortgage", |args: Value| async move {
            let price = args["price"].as_f64().ok_or_else(|| ToolError::failed("missing price"))?;
            Ok(json!({"total": price / 200.0}).to_string())
        });

        let out = registry.invoke("finance.mortgage", &json!({"price": 400000.0})).await.unwrap();
        assert_eq!(out, r#"{"total":2000.0}"#);

        let err = registry.invoke("finance.mortgage", &json!({})).await.unwrap_err();
        assert_eq!(err.to_string(), "missing price");
        assert_eq!(registry.invocation_count("finance.mortgage"), 2);
    }

    #[tokio::test]
    async fn test_unknown_tool() {
        let registry = ToolRegistry::new();
        let err = registry.invoke("graph.explain", &json!({})).await.unwrap_err();
        assert!(matches!(err, ToolError::NotFound(name) if name == "graph.explain"));
        assert_eq!(registry.invocation_count("graph.explain"), 0);
    }
}
