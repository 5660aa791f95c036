//! Error types for the orchestration core.
//!
//! Deferrals and tool failures are not errors at this level: the former are
//! ordinary messages and the latter are recorded in the history. What remains
//! is configuration loading and plan protocol violations.

use thiserror::Error;

use crate::plan::{StepKey, StepStatus};

/// Violations of the plan state machine.
///
/// These indicate a programming error in whoever drives the plan; the
/// coordinator never triggers them.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanError {
    /// A step was started while another one is still running.
    #[error("cannot start '{requested}': step '{running}' is already running")]
    AlreadyRunning { running: StepKey, requested: StepKey },

    /// A status change outside pending → running → done (or pending → done).
    #[error("invalid transition for '{step}': {from} -> {to}")]
    InvalidTransition {
        step: StepKey,
        from: StepStatus,
        to: StepStatus,
    },

    /// The step is not part of the plan.
    #[error("step '{0}' is not part of the plan")]
    UnknownStep(StepKey),
}

/// Errors raised while loading a [`RunConfig`](crate::config::RunConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
    /// File I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parsing failed.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Every task group is switched off.
    #[error("At least one task must be enabled")]
    NoTasksEnabled,

    /// A value parsed but is not usable.
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
