//! estatewise runner binary.
//!
//! Reads one JSON request from stdin, runs the research pipeline against a
//! remote tool server and prints one JSON result to stdout. Logs go to
//! stderr.
//!
//! # Request
//!
//! ```json
//! {"goal": "3 bed homes in Chapel Hill under $600k", "context": {"zpids": [123]},
//!  "include": {"planner": true, "analysis": true, "graph": false, "finance": true, "reporter": true},
//!  "preferences": [], "hints": [], "emphasis": [], "mapFocus": null, "maxRounds": 20}
//! ```
//!
//! Input that is not a JSON object is read as `{}`, and fields of the wrong
//! type are ignored.
//!
//! # Environment Variables
//!
//! - `ESTATEWISE_TOOLS_URL`: tool server base URL (default: http://localhost:4100)
//! - `ESTATEWISE_CONFIG`: optional YAML run configuration file
//! - `ESTATEWISE_MAX_ROUNDS`: round budget override
//! - `RUST_LOG`: tracing filter (default: "info,estatewise=debug")

use std::sync::Arc;

use anyhow::Context;
use serde::de::DeserializeOwned;
use serde_json::{json, Map, Value};
use tokio::io::AsyncReadExt;

use estatewise::{
    Blackboard, ConfigError, Goal, History, HttpToolInvoker, IncludeTasks, RoundExecutor, RunConfig,
};

const CONFIG_ENV: &str = "ESTATEWISE_CONFIG";

#[derive(Debug, Default)]
struct RunRequest {
    goal: Option<String>,
    context: Map<String, Value>,
    include: Option<IncludeTasks>,
    preferences: Vec<String>,
    hints: Vec<String>,
    emphasis: Vec<String>,
    map_focus: Option<String>,
    max_rounds: Option<usize>,
}

impl RunRequest {
    fn parse(input: &str) -> Self {
        match serde_json::from_str::<Value>(input) {
            Ok(Value::Object(obj)) => Self::from_object(&obj),
            Ok(_) => Self::default(),
            Err(e) => {
                if !input.trim().is_empty() {
                    tracing::warn!("Request is not valid JSON, reading it as empty: {}", e);
                }
                Self::default()
            }
        }
    }

    fn from_object(obj: &Map<String, Value>) -> Self {
        Self {
            goal: field(obj, "goal"),
            context: field(obj, "context").unwrap_or_default(),
            include: field(obj, "include"),
            preferences: field(obj, "preferences").unwrap_or_default(),
            hints: field(obj, "hints").unwrap_or_default(),
            emphasis: field(obj, "emphasis").unwrap_or_default(),
            map_focus: field(obj, "mapFocus"),
            max_rounds: field(obj, "maxRounds"),
        }
    }

    fn goal_text(&self) -> Option<&str> {
        self.goal.as_deref().map(str::trim).filter(|g| !g.is_empty())
    }

    /// Layer the request's switches and budget over `base` and validate.
    fn apply(&self, base: RunConfig) -> Result<RunConfig, ConfigError> {
        let mut config = base;
        if let Some(include) = self.include {
            config = config.with_include(include);
        }
        if let Some(max_rounds) = self.max_rounds.filter(|n| *n > 0) {
            config = config.with_max_rounds(max_rounds);
        }
        config.validate()?;
        Ok(config)
    }

    fn goal(&self, text: &str) -> Goal {
        let goal = Goal::new(text)
            .with_preferences(self.preferences.clone())
            .with_hints(self.hints.clone())
            .with_emphasis(self.emphasis.clone());
        match &self.map_focus {
            Some(focus) => goal.with_map_focus(focus.clone()),
            None => goal,
        }
    }

    /// Echo of what the caller asked for, next to the effective switches.
    fn metadata(&self, include: &IncludeTasks) -> Value {
        json!({
            "include": include,
            "preferences": self.preferences,
            "hints": self.hints,
            "emphasis": self.emphasis,
            "mapFocus": self.map_focus,
            "context": self.context,
        })
    }
}

/// A field of the expected type, or `None`.
fn field<T: DeserializeOwned>(obj: &Map<String, Value>, key: &str) -> Option<T> {
    obj.get(key)
        .filter(|v| !v.is_null())
        .and_then(|v| serde_json::from_value(v.clone()).ok())
}

fn failure(error: impl Into<String>) -> Value {
    json!({"ok": false, "error": error.into()})
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,estatewise=debug".into()),
        )
        .init();

    let mut input = String::new();
    tokio::io::stdin()
        .read_to_string(&mut input)
        .await
        .context("failed to read request from stdin")?;

    let request = RunRequest::parse(&input);
    let Some(goal_text) = request.goal_text() else {
        println!("{}", failure("Missing goal"));
        return Ok(());
    };

    let base = match std::env::var(CONFIG_ENV) {
        Ok(path) if !path.trim().is_empty() => {
            tracing::info!("Loading run configuration from {}", path);
            RunConfig::from_yaml_file(&path).with_context(|| format!("failed to load {}", path))?
        }
        _ => RunConfig::default(),
    }
    .with_env_overrides()?;
    let config = match request.apply(base) {
        Ok(config) => config,
        Err(e @ ConfigError::NoTasksEnabled) => {
            println!("{}", failure(e.to_string()));
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    let invoker = HttpToolInvoker::from_env()?;
    tracing::info!("Using tool server at {}", invoker.base_url());

    let metadata = request.metadata(&config.include);
    let goal = request.goal(goal_text);
    let blackboard = Blackboard::seeded(&Value::Object(request.context.clone()));

    let executor = RoundExecutor::new(Arc::new(invoker), config);
    let outcome = executor.run_with(goal, blackboard, History::new()).await;

    let output = json!({
        "ok": true,
        "summary": outcome.report,
        "blackboard": outcome.blackboard.to_value(),
        "history": outcome.history.to_value(),
        "roundsUsed": outcome.rounds_used,
        "completed": outcome.completed,
        "runId": outcome.run_id.to_string(),
        "metadata": metadata,
    });
    println!("{}", serde_json::to_string(&output)?);
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_malformed_input_reads_as_missing_goal() {
        for input in ["{not json", "", "[1, 2]", "\"homes\"", "{\"goal\": \"   \"}"] {
            assert!(RunRequest::parse(input).goal_text().is_none(), "{:?}", input);
        }
    }

    #[test]
    fn test_wrongly_typed_fields_are_ignored() {
        let request = RunRequest::parse(
            r#"{"goal": "homes in Cary", "preferences": "quiet", "hints": ["fast"], "context": [1], "maxRounds": "ten"}"#,
        );
        assert_eq!(request.goal_text(), Some("homes in Cary"));
        assert!(request.preferences.is_empty());
        assert_eq!(request.hints, vec!["fast".to_string()]);
        assert!(request.context.is_empty());
        assert_eq!(request.max_rounds, None);
    }

    #[test]
    fn test_all_tasks_disabled_is_rejected() {
        let request = RunRequest::parse(
            r#"{"goal": "homes", "include": {"planner": false, "analysis": false, "graph": false, "finance": false, "reporter": false}}"#,
        );
        let err = request.apply(RunConfig::default()).unwrap_err();
        assert_eq!(failure(err.to_string()), json!({"ok": false, "error": "At least one task must be enabled"}));
    }

    #[test]
    fn test_partial_include_and_budget_apply() {
        let request = RunRequest::parse(r#"{"goal": "homes", "include": {"graph": false}, "maxRounds": 30}"#);
        let config = request.apply(RunConfig::default()).unwrap();
        assert!(!config.include.graph);
        assert!(config.include.planner && config.include.finance);
        assert_eq!(config.max_rounds, 30);

        let untouched = RunRequest::parse(r#"{"goal": "homes", "maxRounds": 0}"#)
            .apply(RunConfig::default())
            .unwrap();
        assert_eq!(untouched, RunConfig::default());
    }

    #[test]
    fn test_metadata_echo() {
        let request = RunRequest::parse(
            r#"{"goal": "homes", "preferences": ["yard"], "mapFocus": "downtown", "context": {"zpids": [7]}}"#,
        );
        let config = request.apply(RunConfig::default()).unwrap();
        let metadata = request.metadata(&config.include);
        assert_eq!(metadata["preferences"], json!(["yard"]));
        assert_eq!(metadata["mapFocus"], json!("downtown"));
        assert_eq!(metadata["context"], json!({"zpids": [7]}));
        assert_eq!(metadata["include"]["reporter"], json!(true));
        assert_eq!(metadata["hints"], json!([]));

        let goal = request.goal("homes");
        assert_eq!(goal.map_focus.as_deref(), Some("downtown"));
    }
}
