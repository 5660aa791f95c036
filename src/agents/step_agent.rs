//! Step agents: one per external plan step.
//!
//! Each agent knows how to turn the goal and the current blackboard into
//! the tool request for its step, or to tell that the step can be skipped.
//! The coordinator calls [`StepAgent::action`] directly; in round-robin
//! mode the agents propose through [`StepAgent::think`] instead, and the
//! coordinator accepts or rejects the proposal.

use serde_json::{Map, Value};

use super::{known_zpids, AgentContext, Role};
use crate::blackboard::Blackboard;
use crate::goal::Goal;
use crate::history::{AgentMessage, ToolRequest};
use crate::plan::StepKey;

const SEARCH_TOP_K: u64 = 100;
const ANALYTICS_TOP_K: u64 = 200;
const SIMILAR_LIMIT: u64 = 10;
const COMPARE_MAX: usize = 6;
const MAP_MAX: usize = 50;

const DEFAULT_APR: f64 = 6.5;
const DEFAULT_PRICE: f64 = 600_000.0;
const DEFAULT_YEARS: u64 = 30;
const DEFAULT_DOWN_PCT: f64 = 20.0;
const DEFAULT_MONTHLY_BUDGET: f64 = 4_000.0;

/// What a step needs next.
#[derive(Debug, Clone, PartialEq)]
pub enum StepAction {
    /// Dispatch this request.
    Call(ToolRequest),
    /// Nothing to do; the reason goes into the history.
    Skip(String),
}

/// The closed set of external step agents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StepAgent {
    Parse,
    Lookup,
    Search,
    Analytics,
    Graph,
    ComparePairs,
    Map,
    Mortgage,
    Affordability,
}

impl StepAgent {
    /// All agents in plan order.
    pub const ALL: [StepAgent; 9] = [
        StepAgent::Parse,
        StepAgent::Lookup,
        StepAgent::Search,
        StepAgent::Analytics,
        StepAgent::Graph,
        StepAgent::ComparePairs,
        StepAgent::Map,
        StepAgent::Mortgage,
        StepAgent::Affordability,
    ];

    /// Agent backing a step; `None` for inline steps.
    pub fn for_step(step: StepKey) -> Option<StepAgent> {
        StepAgent::ALL.into_iter().find(|agent| agent.step() == step)
    }

    pub fn step(&self) -> StepKey {
        match self {
            StepAgent::Parse => StepKey::Parse,
            StepAgent::Lookup => StepKey::Lookup,
            StepAgent::Search => StepKey::Search,
            StepAgent::Analytics => StepKey::Analytics,
            StepAgent::Graph => StepKey::Graph,
            StepAgent::ComparePairs => StepKey::ComparePairs,
            StepAgent::Map => StepKey::Map,
            StepAgent::Mortgage => StepKey::Mortgage,
            StepAgent::Affordability => StepKey::Affordability,
        }
    }

    pub fn role(&self) -> Role {
        Role::Agent(self.step())
    }

    /// Derive the next action for this step. Deterministic in its inputs.
    pub fn action(&self, goal: &Goal, bb: &Blackboard) -> StepAction {
        match self {
            StepAgent::Parse => {
                StepAction::Call(ToolRequest::new("util.parseGoal").arg("goal", goal.as_str()))
            }
            StepAgent::Lookup => {
                if !bb.zpids().is_empty() {
                    return StepAction::Skip(format!("{} ZPIDs already known", bb.zpids().len()));
                }
                StepAction::Call(ToolRequest::with_args("properties.lookup", filters(goal, bb)))
            }
            StepAgent::Search => {
                let filters = filters(goal, bb);
                let request = if filters.is_empty() {
                    ToolRequest::new("properties.search").arg("q", goal.as_str())
                } else {
                    ToolRequest::with_args("properties.searchAdvanced", filters)
                };
                StepAction::Call(request.arg("topK", SEARCH_TOP_K))
            }
            StepAgent::Analytics => StepAction::Call(
                ToolRequest::with_args("analytics.summarizeSearch", filters(goal, bb))
                    .arg("q", goal.as_str())
                    .arg("topK", ANALYTICS_TOP_K),
            ),
            StepAgent::Graph => match known_zpids(goal, bb).as_slice() {
                [] => StepAction::Skip("no known ZPIDs".into()),
                [only] => StepAction::Call(
                    ToolRequest::new("graph.similar")
                        .arg("zpid", *only)
                        .arg("limit", SIMILAR_LIMIT),
                ),
                [from, to, ..] => StepAction::Call(
                    ToolRequest::new("graph.explain").arg("from", *from).arg("to", *to),
                ),
            },
            StepAgent::ComparePairs => {
                let zpids = known_zpids(goal, bb);
                if zpids.len() < 3 {
                    return StepAction::Skip(format!("{} known ZPIDs, need at least 3", zpids.len()));
                }
                let first: Vec<u64> = zpids.into_iter().take(COMPARE_MAX).collect();
                StepAction::Call(ToolRequest::new("graph.comparePairs").arg("zpids", first))
            }
            StepAgent::Map => {
                let zpids = known_zpids(goal, bb);
                if zpids.is_empty() {
                    StepAction::Call(ToolRequest::new("map.buildLinkByQuery").arg("q", goal.as_str()))
                } else {
                    let first: Vec<u64> = zpids.into_iter().take(MAP_MAX).collect();
                    StepAction::Call(ToolRequest::new("map.linkForZpids").arg("zpids", first))
                }
            }
            StepAgent::Mortgage => {
                let price = bb.median_price().or_else(|| goal.price()).unwrap_or(DEFAULT_PRICE);
                let apr = goal.percent().unwrap_or(DEFAULT_APR);
                StepAction::Call(
                    ToolRequest::new("finance.mortgage")
                        .arg("price", price)
                        .arg("apr", apr)
                        .arg("years", DEFAULT_YEARS)
                        .arg("downPct", DEFAULT_DOWN_PCT),
                )
            }
            StepAgent::Affordability => {
                let request = match goal.income() {
                    Some(income) => ToolRequest::new("finance.affordability").arg("annualIncome", income),
                    None => ToolRequest::new("finance.affordability").arg("monthlyBudget", DEFAULT_MONTHLY_BUDGET),
                };
                StepAction::Call(request)
            }
        }
    }

    /// The tool request for this step, if it is not skipped.
    pub fn request(&self, goal: &Goal, bb: &Blackboard) -> Option<ToolRequest> {
        match self.action(goal, bb) {
            StepAction::Call(request) => Some(request),
            StepAction::Skip(_) => None,
        }
    }

    /// Decide this agent's turn.
    ///
    /// Waits while any step is in flight, or while the history still holds
    /// a call without an outcome, and defers unless its own step is the
    /// current one. Otherwise proposes its request without a call id;
    /// the coordinator allocates one when it accepts.
    pub fn think(&self, ctx: &AgentContext<'_>) -> AgentMessage {
        let role = self.role();
        let Some(plan) = ctx.blackboard.plan() else {
            return AgentMessage::deferral(role, "No plan yet.");
        };
        if let Some(in_flight) = plan.in_flight() {
            return AgentMessage::waiting(role, format!("Waiting: '{}' is in flight.", in_flight.step));
        }
        if let Some(pending) = ctx.history.pending_call() {
            let owner = pending.step_key().map_or_else(|| "unknown step".to_string(), |k| format!("'{}'", k));
            return AgentMessage::waiting(
                role,
                format!("Waiting: {} {} for {} has no outcome yet.", pending.id, pending.name, owner),
            );
        }
        match plan.current() {
            Some(current) if current.key == self.step() => {}
            Some(current) => {
                return AgentMessage::deferral(role, format!("Not my turn; current step is '{}'.", current.key))
            }
            None => return AgentMessage::deferral(role, "Plan already complete."),
        }

        match self.action(ctx.goal, ctx.blackboard) {
            StepAction::Call(request) => {
                let content = format!("Proposing {} for '{}'.", request.name, self.step());
                AgentMessage::tool_call(role, self.step(), None, request, content)
            }
            StepAction::Skip(reason) => {
                AgentMessage::deferral(role, format!("Nothing to request for '{}': {}.", self.step(), reason))
            }
        }
    }
}

/// Lookup/search filters: parsed city, state, zipcode, beds, baths, plus
/// a street address found in the goal.
fn filters(goal: &Goal, bb: &Blackboard) -> Map<String, Value> {
    let mut out = Map::new();
    if let Some(parsed) = bb.parsed() {
        if let Some(city) = &parsed.city {
            out.insert("city".into(), city.clone().into());
        }
        if let Some(state) = &parsed.state {
            out.insert("state".into(), state.clone().into());
        }
        if let Some(zipcode) = &parsed.zipcode {
            out.insert("zipcode".into(), zipcode.clone().into());
        }
        if let Some(beds) = parsed.beds {
            out.insert("beds".into(), beds.into());
        }
        if let Some(baths) = parsed.baths {
            out.insert("baths".into(), baths.into());
        }
    }
    if let Some(address) = goal.address() {
        out.insert("address".into(), address.into());
    }
    out
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blackboard::ParsedFilters;
    use crate::history::History;
    use crate::plan::{Plan, StepOutcome};
    use serde_json::json;

    fn call(agent: StepAgent, goal: &str, bb: &Blackboard) -> ToolRequest {
        agent.request(&Goal::new(goal), bb).expect("expected a tool request")
    }

    #[test]
    fn test_graph_pairs_goal_zpids() {
        let req = call(StepAgent::Graph, "How are 123456 and 654321 related?", &Blackboard::new());
        assert_eq!(req.name, "graph.explain");
        assert_eq!(req.args_value(), json!({"from": 123456, "to": 654321}));
    }

    #[test]
    fn test_graph_single_and_none() {
        let req = call(StepAgent::Graph, "homes like 123456", &Blackboard::new());
        assert_eq!(req.name, "graph.similar");
        assert_eq!(req.args_value(), json!({"zpid": 123456, "limit": 10}));
        assert!(matches!(
            StepAgent::Graph.action(&Goal::new("homes"), &Blackboard::new()),
            StepAction::Skip(_)
        ));
    }

    #[test]
    fn test_search_is_deterministic() {
        let mut bb = Blackboard::new();
        bb.refine_parsed(
            ParsedFilters {
                city: Some("Raleigh".into()),
                beds: Some(3),
                ..Default::default()
            },
            "parse",
        );
        let a = call(StepAgent::Search, "3 bed homes in Raleigh", &bb);
        let b = call(StepAgent::Search, "3 bed homes in Raleigh", &bb);
        assert_eq!(a, b);
        assert_eq!(a.name, "properties.searchAdvanced");
        assert_eq!(a.args_value(), json!({"city": "Raleigh", "beds": 3, "topK": 100}));
    }

    #[test]
    fn test_search_without_filters() {
        let req = call(StepAgent::Search, "quiet homes", &Blackboard::new());
        assert_eq!(req.name, "properties.search");
        assert_eq!(req.args_value(), json!({"q": "quiet homes", "topK": 100}));
    }

    #[test]
    fn test_lookup_includes_address_and_skips_with_zpids() {
        let req = call(StepAgent::Lookup, "what about 12 Elm St", &Blackboard::new());
        assert_eq!(req.args_value(), json!({"address": "12 Elm St"}));

        let mut bb = Blackboard::new();
        bb.extend_zpids([1, 2, 3], "seed");
        assert!(StepAgent::Lookup.request(&Goal::new("x"), &bb).is_none());
    }

    #[test]
    fn test_compare_pairs_threshold_and_cap() {
        let mut bb = Blackboard::new();
        bb.extend_zpids([1, 2], "search");
        assert!(StepAgent::ComparePairs.request(&Goal::new("x"), &bb).is_none());
        bb.extend_zpids([3, 4, 5, 6, 7, 8], "search");
        let req = call(StepAgent::ComparePairs, "x", &bb);
        assert_eq!(req.args_value(), json!({"zpids": [1, 2, 3, 4, 5, 6]}));
    }

    #[test]
    fn test_map_by_zpids_or_query() {
        let mut bb = Blackboard::new();
        assert_eq!(call(StepAgent::Map, "lofts", &bb).name, "map.buildLinkByQuery");
        bb.extend_zpids(1..=60, "search");
        let req = call(StepAgent::Map, "lofts", &bb);
        assert_eq!(req.name, "map.linkForZpids");
        assert_eq!(req.args["zpids"].as_array().map(Vec::len), Some(50));
    }

    #[test]
    fn test_mortgage_defaults_and_sources() {
        let req = call(StepAgent::Mortgage, "homes", &Blackboard::new());
        assert_eq!(
            req.args_value(),
            json!({"price": 600000.0, "apr": 6.5, "years": 30, "downPct": 20.0})
        );

        let req = call(StepAgent::Mortgage, "a $450,000 home at 5.5%", &Blackboard::new());
        assert_eq!(req.args["price"], json!(450000.0));
        assert_eq!(req.args["apr"], json!(5.5));

        let mut bb = Blackboard::new();
        bb.set_analytics(crate::blackboard::AnalyticsSummary {
            median_price: Some(512_000.0),
            ..Default::default()
        });
        let req = call(StepAgent::Mortgage, "a $450,000 home", &bb);
        assert_eq!(req.args["price"], json!(512000.0));
    }

    #[test]
    fn test_bare_goal_price_feeds_mortgage_not_graph() {
        let goal = "monthly payment for a 450000 house at 6%";
        let bb = Blackboard::new();
        let req = call(StepAgent::Mortgage, goal, &bb);
        assert_eq!(req.args["price"], json!(450000.0));
        assert_eq!(req.args["apr"], json!(6.0));

        assert!(matches!(StepAgent::Graph.action(&Goal::new(goal), &bb), StepAction::Skip(_)));
        assert_eq!(call(StepAgent::Map, goal, &bb).name, "map.buildLinkByQuery");
    }

    #[test]
    fn test_known_median_wins_even_when_not_positive() {
        let mut bb = Blackboard::new();
        bb.set_analytics(crate::blackboard::AnalyticsSummary {
            median_price: Some(-1.0),
            ..Default::default()
        });
        let req = call(StepAgent::Mortgage, "a $450,000 home", &bb);
        assert_eq!(req.args["price"], json!(-1.0));
    }

    #[test]
    fn test_affordability_income_or_budget() {
        let req = call(StepAgent::Affordability, "income $140k", &Blackboard::new());
        assert_eq!(req.args_value(), json!({"annualIncome": 140000.0}));
        let req = call(StepAgent::Affordability, "homes", &Blackboard::new());
        assert_eq!(req.args_value(), json!({"monthlyBudget": 4000.0}));
    }

    #[test]
    fn test_think_defers_out_of_turn() {
        let goal = Goal::new("homes");
        let history = History::new();
        let mut bb = Blackboard::new();
        bb.restore_plan(Plan::new("homes"));

        let ctx = AgentContext::new(&goal, &bb, &history);
        let msg = StepAgent::Search.think(&ctx);
        assert_eq!(msg.kind, crate::history::MessageKind::Deferral);
        assert!(msg.tool_request().is_none());

        let msg = StepAgent::Parse.think(&ctx);
        let (step, id, request) = msg.tool_request().unwrap();
        assert_eq!(step, StepKey::Parse);
        assert_eq!(id, None);
        assert_eq!(request.name, "util.parseGoal");
    }

    #[test]
    fn test_think_waits_while_in_flight() {
        let goal = Goal::new("homes");
        let history = History::new();
        let mut bb = Blackboard::new();
        let mut plan = Plan::new("homes");
        plan.start(StepKey::Parse, crate::history::CallId(1), "util.parseGoal").unwrap();
        bb.restore_plan(plan);

        let ctx = AgentContext::new(&goal, &bb, &history);
        let msg = StepAgent::Parse.think(&ctx);
        assert_eq!(msg.kind, crate::history::MessageKind::Waiting);

        let mut plan = bb.take_plan().unwrap();
        plan.finish(StepKey::Parse, StepOutcome::Completed).unwrap();
        bb.restore_plan(plan);
        let ctx = AgentContext::new(&goal, &bb, &history);
        assert!(StepAgent::Lookup.think(&ctx).tool_request().is_some());
    }

    #[test]
    fn test_think_waits_on_unresolved_history_call() {
        let goal = Goal::new("homes");
        let mut bb = Blackboard::new();
        bb.restore_plan(Plan::new("homes"));
        let mut history = History::new();
        history.open_call(
            crate::history::CallId(7),
            None,
            &ToolRequest::new("graph.similar").arg("zpid", 123456u64),
        );

        let msg = StepAgent::Parse.think(&AgentContext::new(&goal, &bb, &history));
        assert_eq!(msg.kind, crate::history::MessageKind::Waiting);
        assert_eq!(msg.content, "Waiting: call-7 graph.similar for 'graph' has no outcome yet.");

        history.fail_call(crate::history::CallId(7), "gone".into(), 1);
        let msg = StepAgent::Parse.think(&AgentContext::new(&goal, &bb, &history));
        assert!(msg.tool_request().is_some());
    }

    #[test]
    fn test_inline_steps_have_no_agent() {
        assert!(StepAgent::for_step(StepKey::DedupeRank).is_none());
        assert!(StepAgent::for_step(StepKey::Compliance).is_none());
        assert_eq!(StepAgent::for_step(StepKey::Map), Some(StepAgent::Map));
    }
}
