//! # EstateWise research orchestrator
//!
//! Goal-driven, multi-step research core. A free-text goal is turned into a
//! fixed plan (parse, lookup, search, analytics, rank, graph, pair
//! comparison, map, mortgage, affordability, compliance) which the
//! [`Coordinator`] walks one round at a time against a shared
//! [`Blackboard`]. External work is expressed as [`ToolRequest`]s that the
//! [`RoundExecutor`] hands to a [`ToolInvoker`]; the [`ReportCompiler`]
//! renders whatever the blackboard holds at the end of the run.
//!
//! The loop is single-threaded and round-based: at most one step is ever
//! waiting on a tool, and tool dispatch is the only suspension point.

pub mod agents;
pub mod blackboard;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod executor;
pub mod goal;
pub mod history;
pub mod plan;
pub mod report;
pub mod tools;

pub use agents::{compliance::check_compliance, rank::dedupe_rank, Role, StepAgent};
pub use blackboard::{Blackboard, Phase};
pub use config::{CompletionDetection, ExecutionMode, FailureAction, IncludeTasks, RunConfig, StepPolicy, TaskGroup};
pub use coordinator::Coordinator;
pub use error::{ConfigError, PlanError};
pub use executor::{RoundExecutor, RunOutcome};
pub use goal::Goal;
pub use history::{AgentMessage, CallId, CallStatus, History, MessageKind, ToolCallRecord, ToolRequest};
pub use plan::{Plan, PlanStep, StepKey, StepOutcome, StepStatus};
pub use report::ReportCompiler;
pub use tools::{HttpToolInvoker, ToolError, ToolInvoker, ToolRegistry};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
