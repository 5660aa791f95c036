//! Blackboard — the run's shared fact record.
//!
//! Every field has exactly one owning step, named on its writer. Writers
//! only add or refine: nothing here clears a field that is already set.
//! Each write is appended to the trace together with the writer's name.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::facts::{AnalyticsSummary, ComplianceReport, MortgageEstimate, ParsedFilters};
use super::merge::zpid_from_value;
use crate::agents::Role;
use crate::plan::Plan;

/// One entry of the write trace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceEntry {
    /// Field written, or a `phase:start` / `phase:end` marker.
    pub key: String,
    /// Writer (step key or role).
    pub source: String,
    /// Turn duration, on `phase:end` entries.
    pub elapsed_ms: Option<u64>,
    /// Fields written during the turn, on `phase:end` entries.
    pub writes: Option<usize>,
}

/// Shared mutable state for one run.
///
/// Passed as `&mut Blackboard` to whichever agent holds the current round,
/// so at most one writer exists at a time.
///
/// # Example
///
/// ```
/// use estatewise::Blackboard;
///
/// let mut bb = Blackboard::new();
/// bb.extend_zpids([101, 102, 101], "search");
/// assert_eq!(bb.zpids(), &[101, 102, 101]);
///
/// bb.set_ranked_zpids(vec![101, 102]);
/// assert_eq!(bb.zpids(), &[101, 102]);
/// assert_eq!(bb.ranked_zpids(), &[101, 102]);
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Blackboard {
    zpids: Vec<u64>,
    ranked_zpids: Vec<u64>,
    parsed: Option<ParsedFilters>,
    analytics: Option<AnalyticsSummary>,
    graph: Option<Value>,
    pair_comparisons: Option<Value>,
    map_link: Option<String>,
    mortgage: Option<MortgageEstimate>,
    affordability: Option<Value>,
    compliance: Option<ComplianceReport>,
    plan: Option<Plan>,
    #[serde(skip)]
    trace: Vec<TraceEntry>,
}

/// Caller-supplied starting facts.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BlackboardSeed {
    #[serde(default)]
    zpids: Vec<Value>,
    #[serde(default)]
    parsed: Option<ParsedFilters>,
}

impl Blackboard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Blackboard pre-seeded from a JSON context object.
    ///
    /// Recognizes `zpids` (numbers or numeric strings) and `parsed`
    /// filters; anything else is ignored.
    pub fn seeded(context: &Value) -> Self {
        let mut bb = Self::new();
        match serde_json::from_value::<BlackboardSeed>(context.clone()) {
            Ok(seed) => {
                let zpids: Vec<u64> = seed.zpids.iter().filter_map(zpid_from_value).collect();
                if !zpids.is_empty() {
                    bb.extend_zpids(zpids, "seed");
                }
                if let Some(parsed) = seed.parsed {
                    bb.refine_parsed(parsed, "seed");
                }
            }
            Err(e) => log::warn!("Blackboard: ignoring unusable seed context: {}", e),
        }
        bb
    }

    // --- Discovery (parse, lookup, search) ---

    pub fn zpids(&self) -> &[u64] {
        &self.zpids
    }

    /// Append discovered ZPIDs. Owned by the discovery steps.
    pub fn extend_zpids(&mut self, ids: impl IntoIterator<Item = u64>, source: &str) {
        let before = self.zpids.len();
        self.zpids.extend(ids);
        if self.zpids.len() > before {
            self.record("zpids", source);
        }
    }

    pub fn parsed(&self) -> Option<&ParsedFilters> {
        self.parsed.as_ref()
    }

    /// Merge parsed filters. Owned by `parse`.
    pub fn refine_parsed(&mut self, filters: ParsedFilters, source: &str) {
        match self.parsed.as_mut() {
            Some(existing) => existing.refine(filters),
            None => self.parsed = Some(filters),
        }
        self.record("parsed", source);
    }

    // --- Ranking (dedupeRank) ---

    pub fn ranked_zpids(&self) -> &[u64] {
        &self.ranked_zpids
    }

    /// Store the ranked set and mirror it into `zpids`. Owned by `dedupeRank`.
    pub fn set_ranked_zpids(&mut self, ranked: Vec<u64>) {
        self.zpids = ranked.clone();
        self.ranked_zpids = ranked;
        self.record("rankedZpids", "dedupeRank");
    }

    // --- Analytics ---

    pub fn analytics(&self) -> Option<&AnalyticsSummary> {
        self.analytics.as_ref()
    }

    /// Owned by `analytics`.
    pub fn set_analytics(&mut self, summary: AnalyticsSummary) {
        self.analytics = Some(summary);
        self.record("analytics", "analytics");
    }

    /// Median price from analytics, when known.
    pub fn median_price(&self) -> Option<f64> {
        self.analytics.as_ref().and_then(|a| a.median_price)
    }

    // --- Graph (graph, comparePairs) ---

    pub fn graph(&self) -> Option<&Value> {
        self.graph.as_ref()
    }

    /// Owned by `graph`.
    pub fn set_graph(&mut self, value: Value) {
        self.graph = Some(value);
        self.record("graph", "graph");
    }

    pub fn pair_comparisons(&self) -> Option<&Value> {
        self.pair_comparisons.as_ref()
    }

    /// Owned by `comparePairs`.
    pub fn set_pair_comparisons(&mut self, value: Value) {
        self.pair_comparisons = Some(value);
        self.record("pairComparisons", "comparePairs");
    }

    // --- Map ---

    pub fn map_link(&self) -> Option<&str> {
        self.map_link.as_deref()
    }

    /// Owned by `map`.
    pub fn set_map_link(&mut self, link: impl Into<String>) {
        self.map_link = Some(link.into());
        self.record("mapLink", "map");
    }

    // --- Finance ---

    pub fn mortgage(&self) -> Option<&MortgageEstimate> {
        self.mortgage.as_ref()
    }

    /// Owned by `mortgage`.
    pub fn set_mortgage(&mut self, estimate: MortgageEstimate) {
        self.mortgage = Some(estimate);
        self.record("mortgage", "mortgage");
    }

    pub fn affordability(&self) -> Option<&Value> {
        self.affordability.as_ref()
    }

    /// Owned by `affordability`.
    pub fn set_affordability(&mut self, value: Value) {
        self.affordability = Some(value);
        self.record("affordability", "affordability");
    }

    // --- Compliance ---

    pub fn compliance(&self) -> Option<&ComplianceReport> {
        self.compliance.as_ref()
    }

    /// Owned by `compliance`.
    pub fn set_compliance(&mut self, report: ComplianceReport) {
        self.compliance = Some(report);
        self.record("compliance", "compliance");
    }

    // --- Plan (coordinator only) ---

    pub fn plan(&self) -> Option<&Plan> {
        self.plan.as_ref()
    }

    /// Detach the plan so the coordinator can advance it while reading
    /// the rest of the blackboard. Must be paired with [`restore_plan`](Self::restore_plan).
    pub(crate) fn take_plan(&mut self) -> Option<Plan> {
        self.plan.take()
    }

    pub(crate) fn restore_plan(&mut self, plan: Plan) {
        let created = self.plan.is_none();
        self.plan = Some(plan);
        if created && !self.trace.iter().any(|t| t.key == "plan") {
            self.record("plan", "coordinator");
        }
    }

    // --- Trace ---

    pub fn trace(&self) -> &[TraceEntry] {
        &self.trace
    }

    /// Fields written across all finished turns of `role`.
    pub fn phase_writes(&self, role: Role) -> usize {
        let source = role.to_string();
        self.trace
            .iter()
            .filter(|t| t.key == "phase:end" && t.source == source)
            .filter_map(|t| t.writes)
            .sum()
    }

    pub(crate) fn record_phase_start(&mut self, role: Role) {
        self.record("phase:start", &role.to_string());
    }

    pub(crate) fn record_phase_end(&mut self, role: Role, elapsed_ms: u64, writes: usize) {
        log::trace!("Blackboard: {} turn took {} ms, {} write(s)", role, elapsed_ms, writes);
        self.trace.push(TraceEntry {
            key: "phase:end".to_string(),
            source: role.to_string(),
            elapsed_ms: Some(elapsed_ms),
            writes: Some(writes),
        });
    }

    fn record(&mut self, key: &str, source: &str) {
        self.trace.push(TraceEntry {
            key: key.to_string(),
            source: source.to_string(),
            elapsed_ms: None,
            writes: None,
        });
    }

    /// Full blackboard as JSON (trace excluded).
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
