//! Run configuration.
//!
//! Every field has a default, so an empty YAML document is a valid
//! configuration. Per-step policies override [`RunConfig::default_policy`].
//!
//! ```yaml
//! maxRounds: 12
//! mode: roundRobin
//! completion: textPrefix
//! include:
//!   graph: false
//! steps:
//!   search:
//!     maxRetries: 2
//!     timeoutSecs: 10
//!     onFailure: abort
//! ```

use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::plan::StepKey;

/// Environment variable that overrides [`RunConfig::max_rounds`].
pub const MAX_ROUNDS_ENV: &str = "ESTATEWISE_MAX_ROUNDS";

/// Who acts each round.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ExecutionMode {
    /// The coordinator acts every round.
    #[default]
    Coordinator,
    /// Coordinator first, then each step agent in plan order, repeating.
    RoundRobin,
}

/// How the coordinator decides that an in-flight call has finished.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CompletionDetection {
    /// Check the typed call record for the in-flight call id.
    #[default]
    Structured,
    /// Scan history for a `Tool <name> result` / `Tool <name> error` message.
    TextPrefix,
}

/// What happens to a step whose call keeps failing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FailureAction {
    /// Mark the step done with a failed outcome and move on.
    #[default]
    Skip,
    /// Keep waiting on the step.
    Stall,
    /// Stop the run.
    Abort,
}

/// Task groups a caller can switch off. Each external step belongs to one
/// group; the inline rank and compliance steps always run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TaskGroup {
    /// Goal parsing.
    Planner,
    /// Lookup, search and market analytics.
    Analysis,
    /// Similarity graph and pair comparison.
    Graph,
    /// Mortgage and affordability.
    Finance,
    /// The map link handed to the reader.
    Reporter,
}

impl TaskGroup {
    pub fn for_step(step: StepKey) -> Option<TaskGroup> {
        match step {
            StepKey::Parse => Some(TaskGroup::Planner),
            StepKey::Lookup | StepKey::Search | StepKey::Analytics => Some(TaskGroup::Analysis),
            StepKey::Graph | StepKey::ComparePairs => Some(TaskGroup::Graph),
            StepKey::Map => Some(TaskGroup::Reporter),
            StepKey::Mortgage | StepKey::Affordability => Some(TaskGroup::Finance),
            StepKey::DedupeRank | StepKey::Compliance => None,
        }
    }
}

impl fmt::Display for TaskGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TaskGroup::Planner => "planner",
            TaskGroup::Analysis => "analysis",
            TaskGroup::Graph => "graph",
            TaskGroup::Finance => "finance",
            TaskGroup::Reporter => "reporter",
        };
        f.write_str(name)
    }
}

/// Per-group switches. A missing key means enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncludeTasks {
    #[serde(default = "default_true")]
    pub planner: bool,
    #[serde(default = "default_true")]
    pub analysis: bool,
    #[serde(default = "default_true")]
    pub graph: bool,
    #[serde(default = "default_true")]
    pub finance: bool,
    #[serde(default = "default_true")]
    pub reporter: bool,
}

fn default_true() -> bool { true }

impl Default for IncludeTasks {
    fn default() -> Self {
        Self {
            planner: true,
            analysis: true,
            graph: true,
            finance: true,
            reporter: true,
        }
    }
}

impl IncludeTasks {
    pub fn is_enabled(&self, group: TaskGroup) -> bool {
        match group {
            TaskGroup::Planner => self.planner,
            TaskGroup::Analysis => self.analysis,
            TaskGroup::Graph => self.graph,
            TaskGroup::Finance => self.finance,
            TaskGroup::Reporter => self.reporter,
        }
    }

    /// The group that switches `step` off, if it is switched off.
    pub fn disabled_group(&self, step: StepKey) -> Option<TaskGroup> {
        TaskGroup::for_step(step).filter(|group| !self.is_enabled(*group))
    }

    pub fn any(&self) -> bool {
        self.planner || self.analysis || self.graph || self.finance || self.reporter
    }
}

/// Retry, timeout and failure handling for one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepPolicy {
    /// Extra dispatch attempts after the first failure.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Per-attempt timeout. `null` disables it.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub on_failure: FailureAction,
}

fn default_max_retries() -> u32 { 1 }
fn default_timeout_secs() -> Option<u64> { Some(30) }

impl Default for StepPolicy {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
            on_failure: FailureAction::default(),
        }
    }
}

impl StepPolicy {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }

    /// Total dispatch attempts allowed.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }
}

/// Configuration for one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunConfig {
    /// Round budget. Exhaustion ends the run with partial state.
    #[serde(default = "default_max_rounds")]
    pub max_rounds: usize,
    #[serde(default)]
    pub mode: ExecutionMode,
    #[serde(default)]
    pub completion: CompletionDetection,
    #[serde(default)]
    pub include: IncludeTasks,
    /// Number of tool executions listed at the end of the report.
    #[serde(default = "default_trace_len")]
    pub trace_len: usize,
    /// Policy for steps without an entry in `steps`.
    #[serde(default)]
    pub default_policy: StepPolicy,
    #[serde(default)]
    pub steps: HashMap<StepKey, StepPolicy>,
}

fn default_max_rounds() -> usize { 5 }
fn default_trace_len() -> usize { 5 }

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            max_rounds: default_max_rounds(),
            mode: ExecutionMode::default(),
            completion: CompletionDetection::default(),
            include: IncludeTasks::default(),
            trace_len: default_trace_len(),
            default_policy: StepPolicy::default(),
            steps: HashMap::new(),
        }
    }
}

impl RunConfig {
    /// Parse a `RunConfig` from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a `RunConfig` from a YAML file on disk.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Apply `ESTATEWISE_MAX_ROUNDS` when it is set.
    pub fn with_env_overrides(self) -> Result<Self, ConfigError> {
        let raw = std::env::var(MAX_ROUNDS_ENV).ok();
        self.with_max_rounds_override(raw.as_deref())
    }

    fn with_max_rounds_override(mut self, raw: Option<&str>) -> Result<Self, ConfigError> {
        if let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) {
            self.max_rounds = raw
                .parse()
                .map_err(|_| ConfigError::Invalid(format!("{} is not a number: '{}'", MAX_ROUNDS_ENV, raw)))?;
            self.validate()?;
        }
        Ok(self)
    }

    pub fn with_max_rounds(mut self, max_rounds: usize) -> Self {
        self.max_rounds = max_rounds;
        self
    }

    pub fn with_mode(mut self, mode: ExecutionMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_completion(mut self, completion: CompletionDetection) -> Self {
        self.completion = completion;
        self
    }

    pub fn with_include(mut self, include: IncludeTasks) -> Self {
        self.include = include;
        self
    }

    pub fn with_step_policy(mut self, step: StepKey, policy: StepPolicy) -> Self {
        self.steps.insert(step, policy);
        self
    }

    /// Effective policy for a step.
    pub fn policy_for(&self, step: StepKey) -> StepPolicy {
        self.steps.get(&step).copied().unwrap_or(self.default_policy)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_rounds == 0 {
            return Err(ConfigError::Invalid("maxRounds must be > 0".into()));
        }
        if !self.include.any() {
            return Err(ConfigError::NoTasksEnabled);
        }
        let zero_timeout = std::iter::once((None, &self.default_policy))
            .chain(self.steps.iter().map(|(k, p)| (Some(*k), p)))
            .find(|(_, p)| p.timeout_secs == Some(0));
        if let Some((step, _)) = zero_timeout {
            let owner = step.map(|k| k.to_string()).unwrap_or_else(|| "defaultPolicy".into());
            return Err(ConfigError::Invalid(format!(
                "{}: timeoutSecs must be > 0 (use null to disable)",
                owner
            )));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = RunConfig::default();
        assert_eq!(config.max_rounds, 5);
        assert_eq!(config.mode, ExecutionMode::Coordinator);
        assert_eq!(config.completion, CompletionDetection::Structured);
        assert_eq!(config.trace_len, 5);

        let policy = config.policy_for(StepKey::Search);
        assert_eq!(policy.max_retries, 1);
        assert_eq!(policy.max_attempts(), 2);
        assert_eq!(policy.timeout(), Some(Duration::from_secs(30)));
        assert_eq!(policy.on_failure, FailureAction::Skip);
    }

    #[test]
    fn test_empty_yaml_is_default() {
        let config = RunConfig::from_yaml("{}").unwrap();
        assert_eq!(config, RunConfig::default());
    }

    #[test]
    fn test_step_overrides() {
        let yaml = r#"
maxRounds: 12
mode: roundRobin
completion: textPrefix
steps:
  search:
    maxRetries: 2
    timeoutSecs: 10
    onFailure: abort
  graph:
    timeoutSecs: null
"#;
        let config = RunConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.max_rounds, 12);
        assert_eq!(config.mode, ExecutionMode::RoundRobin);
        assert_eq!(config.completion, CompletionDetection::TextPrefix);

        let search = config.policy_for(StepKey::Search);
        assert_eq!(search.max_retries, 2);
        assert_eq!(search.on_failure, FailureAction::Abort);
        assert_eq!(config.policy_for(StepKey::Graph).timeout(), None);
        assert_eq!(config.policy_for(StepKey::Map), StepPolicy::default());
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(matches!(
            RunConfig::from_yaml("maxRounds: 0"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            RunConfig::from_yaml("steps:\n  map:\n    timeoutSecs: 0\n"),
            Err(ConfigError::Invalid(msg)) if msg.starts_with("map:")
        ));
        assert!(matches!(
            RunConfig::from_yaml("mode: [nope"),
            Err(ConfigError::Yaml(_))
        ));
    }

    #[test]
    fn test_include_switches() {
        let config = RunConfig::from_yaml("include:\n  graph: false\n  finance: false\n").unwrap();
        assert!(config.include.planner && config.include.reporter);
        assert_eq!(config.include.disabled_group(StepKey::ComparePairs), Some(TaskGroup::Graph));
        assert_eq!(config.include.disabled_group(StepKey::Mortgage), Some(TaskGroup::Finance));
        assert_eq!(config.include.disabled_group(StepKey::Search), None);
        assert_eq!(config.include.disabled_group(StepKey::Compliance), None);

        let none = "include: {planner: false, analysis: false, graph: false, finance: false, reporter: false}";
        let err = RunConfig::from_yaml(none).unwrap_err();
        assert!(matches!(err, ConfigError::NoTasksEnabled));
        assert_eq!(err.to_string(), "At least one task must be enabled");
    }

    #[test]
    fn test_max_rounds_override() {
        let config = RunConfig::default().with_max_rounds_override(Some(" 9 ")).unwrap();
        assert_eq!(config.max_rounds, 9);
        let unchanged = RunConfig::default().with_max_rounds_override(None).unwrap();
        assert_eq!(unchanged.max_rounds, 5);
        assert!(RunConfig::default().with_max_rounds_override(Some("many")).is_err());
        assert!(RunConfig::default().with_max_rounds_override(Some("0")).is_err());
    }

    #[test]
    fn test_from_yaml_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "maxRounds: 20\ntraceLen: 3").unwrap();
        let config = RunConfig::from_yaml_file(file.path()).unwrap();
        assert_eq!(config.max_rounds, 20);
        assert_eq!(config.trace_len, 3);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = RunConfig::from_yaml_file(dir.path().join("absent.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
