//! Plan steps: the fixed step table and per-step lifecycle.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Stable identifier of a plan step.
///
/// The set of keys is closed; each external step is backed by one
/// [`StepAgent`](crate::agents::StepAgent) and the two inline steps are
/// executed by the coordinator itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StepKey {
    Parse,
    Lookup,
    Search,
    Analytics,
    DedupeRank,
    Graph,
    ComparePairs,
    Map,
    Mortgage,
    Affordability,
    Compliance,
}

/// Plan order together with the human-readable description of each step.
pub const STEP_TABLE: [(StepKey, &str); 11] = [
    (StepKey::Parse, "Parse the goal into structured filters"),
    (StepKey::Lookup, "Look up records matching an address or filters"),
    (StepKey::Search, "Search properties matching the goal"),
    (StepKey::Analytics, "Summarize market statistics for the search"),
    (StepKey::DedupeRank, "Deduplicate and rank collected ZPIDs"),
    (StepKey::Graph, "Explain graph relationships between leading properties"),
    (StepKey::ComparePairs, "Compare leading properties pairwise"),
    (StepKey::Map, "Build a map link for the candidates"),
    (StepKey::Mortgage, "Estimate the monthly mortgage payment"),
    (StepKey::Affordability, "Estimate affordability"),
    (StepKey::Compliance, "Validate collected figures"),
];

impl StepKey {
    /// All keys in plan order.
    pub fn all() -> impl Iterator<Item = StepKey> {
        STEP_TABLE.iter().map(|(key, _)| *key)
    }

    /// Wire name of the key (matches the serde representation).
    pub fn as_str(&self) -> &'static str {
        match self {
            StepKey::Parse => "parse",
            StepKey::Lookup => "lookup",
            StepKey::Search => "search",
            StepKey::Analytics => "analytics",
            StepKey::DedupeRank => "dedupeRank",
            StepKey::Graph => "graph",
            StepKey::ComparePairs => "comparePairs",
            StepKey::Map => "map",
            StepKey::Mortgage => "mortgage",
            StepKey::Affordability => "affordability",
            StepKey::Compliance => "compliance",
        }
    }

    /// Tools whose successful result satisfies this step.
    ///
    /// Inline steps have no expected tools.
    pub fn expected_tools(&self) -> &'static [&'static str] {
        match self {
            StepKey::Parse => &["util.parseGoal"],
            StepKey::Lookup => &["properties.lookup"],
            StepKey::Search => &["properties.search", "properties.searchAdvanced"],
            StepKey::Analytics => &["analytics.summarizeSearch"],
            StepKey::DedupeRank => &[],
            StepKey::Graph => &["graph.explain", "graph.similar"],
            StepKey::ComparePairs => &["graph.comparePairs"],
            StepKey::Map => &["map.linkForZpids", "map.buildLinkByQuery"],
            StepKey::Mortgage => &["finance.mortgage"],
            StepKey::Affordability => &["finance.affordability"],
            StepKey::Compliance => &[],
        }
    }

    /// Whether the coordinator executes this step synchronously.
    pub fn is_inline(&self) -> bool {
        matches!(self, StepKey::DedupeRank | StepKey::Compliance)
    }

    /// Step that a tool name belongs to, if any.
    pub fn for_tool(tool: &str) -> Option<StepKey> {
        StepKey::all().find(|key| key.expected_tools().contains(&tool))
    }

    pub fn description(&self) -> &'static str {
        STEP_TABLE
            .iter()
            .find(|(key, _)| key == self)
            .map(|(_, desc)| *desc)
            .unwrap_or_default()
    }
}

impl fmt::Display for StepKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle status of a step: `pending → running → done`, or `pending → done`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Pending,
    Running,
    Done,
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepStatus::Pending => write!(f, "pending"),
            StepStatus::Running => write!(f, "running"),
            StepStatus::Done => write!(f, "done"),
        }
    }
}

/// How a finished step ended. Recorded only once the step is `done`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepOutcome {
    /// The tool result arrived, or the inline computation ran.
    Completed,
    /// The precondition was already satisfied or moot.
    Skipped,
    /// The tool kept failing and the step policy chose to move on.
    Failed,
}

/// A single entry of the plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanStep {
    pub key: StepKey,
    pub description: String,
    pub status: StepStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome: Option<StepOutcome>,
}

impl PlanStep {
    pub fn new(key: StepKey) -> Self {
        Self {
            key,
            description: key.description().to_string(),
            status: StepStatus::Pending,
            outcome: None,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == StepStatus::Pending
    }

    pub fn is_running(&self) -> bool {
        self.status == StepStatus::Running
    }

    pub fn is_done(&self) -> bool {
        self.status == StepStatus::Done
    }
}
