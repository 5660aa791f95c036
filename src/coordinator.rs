//! The coordinator: sole owner of the plan.
//!
//! Once per round the coordinator reconciles the in-flight step with the
//! history, then walks the plan forward: skipped and inline steps finish on
//! the spot, and the first external step that needs a tool is started and
//! returned as a tool call. It never returns an error; anything it cannot
//! act on becomes a waiting message.

use crate::agents::compliance::{check_compliance, ComplianceInput};
use crate::agents::rank::dedupe_rank;
use crate::agents::{Role, StepAction, StepAgent};
use crate::blackboard::Blackboard;
use crate::config::{CompletionDetection, FailureAction, RunConfig};
use crate::error::PlanError;
use crate::goal::Goal;
use crate::history::{AgentMessage, CallStatus, History, MessageKind};
use crate::plan::{InFlight, Plan, StepKey, StepOutcome};

/// State of the in-flight call as seen from the history.
#[derive(Debug, Clone, PartialEq)]
enum Completion {
    Pending,
    Succeeded,
    Failed(String),
}

#[derive(Debug, Clone, Default)]
pub struct Coordinator {
    config: RunConfig,
    /// Leave request construction to the step agents (round-robin mode).
    delegating: bool,
}

impl Coordinator {
    pub fn new(config: RunConfig) -> Self {
        Self {
            config,
            delegating: false,
        }
    }

    /// In delegating mode the coordinator still reconciles completions and
    /// runs skips and inline steps, but stops at the first step that needs
    /// a tool and waits for that step's agent to propose the request.
    pub fn delegating(mut self, on: bool) -> Self {
        self.delegating = on;
        self
    }

    /// Take one turn. The plan is created on the first call.
    pub fn think(&self, goal: &Goal, bb: &mut Blackboard, history: &History) -> AgentMessage {
        let mut plan = bb.take_plan().unwrap_or_else(|| {
            log::debug!("Coordinator: creating plan for goal '{}'", goal.as_str());
            Plan::new(goal.as_str())
        });
        let message = self.advance(goal, bb, history, &mut plan);
        bb.restore_plan(plan);
        message
    }

    /// Validate a step agent's proposal and, if acceptable, start its step.
    ///
    /// The proposal must carry a request for the current step, use one of
    /// that step's tools, and arrive while nothing is in flight. On
    /// acceptance the returned message carries the request with a freshly
    /// allocated call id; otherwise it is a deferral explaining the refusal.
    pub fn accept_proposal(&self, proposal: &AgentMessage, bb: &mut Blackboard, history: &History) -> AgentMessage {
        let Some((step, _, request)) = proposal.tool_request() else {
            return AgentMessage::deferral(Role::Coordinator, "Nothing to accept.");
        };
        let Some(plan) = bb.plan() else {
            return reject(step, "no plan yet");
        };
        if let Some(in_flight) = plan.in_flight() {
            return reject(step, &format!("'{}' is in flight", in_flight.step));
        }
        match plan.current() {
            Some(current) if current.key == step => {}
            Some(current) => return reject(step, &format!("current step is '{}'", current.key)),
            None => return reject(step, "plan is complete"),
        }
        if let Some(group) = self.config.include.disabled_group(step) {
            return reject(step, &format!("{} tasks are disabled", group));
        }
        if !step.expected_tools().contains(&request.name.as_str()) {
            return reject(step, &format!("'{}' does not satisfy this step", request.name));
        }

        let call_id = history.next_call_id();
        let Some(mut plan) = bb.take_plan() else {
            return reject(step, "no plan yet");
        };
        let started = plan.start(step, call_id, &request.name);
        bb.restore_plan(plan);
        if let Err(e) = started {
            log::error!("Coordinator: {}", e);
            return reject(step, &e.to_string());
        }

        log::info!("Coordinator: accepted {} for '{}' as {}", request.name, step, call_id);
        AgentMessage::tool_call(
            Role::Coordinator,
            step,
            Some(call_id),
            request.clone(),
            format!("Accepted {} from {} for '{}'.", request.name, proposal.from, step),
        )
    }

    fn advance(&self, goal: &Goal, bb: &mut Blackboard, history: &History, plan: &mut Plan) -> AgentMessage {
        if let Some(in_flight) = plan.in_flight().cloned() {
            return self.reconcile(&in_flight, history, plan);
        }

        let mut notes: Vec<String> = Vec::new();
        loop {
            let Some(step) = plan.current().map(|s| s.key) else {
                notes.push(format!("Plan complete: {} steps done.", plan.done_count()));
                log::info!("Coordinator: plan complete");
                return AgentMessage::new(Role::Coordinator, MessageKind::PlanComplete, notes.join(" "));
            };

            if step.is_inline() {
                let note = run_inline(step, bb);
                log_transition(plan.finish(step, StepOutcome::Completed));
                notes.push(note);
                continue;
            }

            if let Some(group) = self.config.include.disabled_group(step) {
                log::debug!("Coordinator: skipping '{}': {} tasks disabled", step, group);
                log_transition(plan.finish(step, StepOutcome::Skipped));
                notes.push(format!("Skipped '{}': {} tasks disabled.", step, group));
                continue;
            }

            let Some(agent) = StepAgent::for_step(step) else {
                log::error!("Coordinator: no agent for external step '{}'", step);
                log_transition(plan.finish(step, StepOutcome::Failed));
                continue;
            };

            match agent.action(goal, bb) {
                StepAction::Skip(reason) => {
                    log::debug!("Coordinator: skipping '{}': {}", step, reason);
                    log_transition(plan.finish(step, StepOutcome::Skipped));
                    notes.push(format!("Skipped '{}': {}.", step, reason));
                }
                StepAction::Call(_) if self.delegating => {
                    notes.push(format!("Awaiting proposal from {}.", agent.role()));
                    return AgentMessage::waiting(Role::Coordinator, notes.join(" "));
                }
                StepAction::Call(request) => {
                    let call_id = history.next_call_id();
                    if let Err(e) = plan.start(step, call_id, &request.name) {
                        log::error!("Coordinator: {}", e);
                        notes.push(format!("Could not start '{}'.", step));
                        return AgentMessage::waiting(Role::Coordinator, notes.join(" "));
                    }
                    log::info!("Coordinator: '{}' -> {} ({})", step, request.name, call_id);
                    notes.push(format!("Step '{}': calling {}.", step, request.name));
                    return AgentMessage::tool_call(Role::Coordinator, step, Some(call_id), request, notes.join(" "));
                }
            }
        }
    }

    /// Settle the in-flight step against the history.
    fn reconcile(&self, in_flight: &InFlight, history: &History, plan: &mut Plan) -> AgentMessage {
        let step = in_flight.step;
        match self.completion(in_flight, history) {
            Completion::Pending => AgentMessage::waiting(
                Role::Coordinator,
                format!("Waiting on {} for '{}'.", in_flight.tool, step),
            ),
            Completion::Succeeded => {
                log_transition(plan.finish(step, StepOutcome::Completed));
                AgentMessage::new(
                    Role::Coordinator,
                    MessageKind::StepCompleted,
                    format!("Step '{}' completed.", step),
                )
            }
            Completion::Failed(error) => match self.config.policy_for(step).on_failure {
                FailureAction::Skip => {
                    log::warn!("Coordinator: '{}' failed, skipping: {}", step, error);
                    log_transition(plan.finish(step, StepOutcome::Failed));
                    AgentMessage::new(
                        Role::Coordinator,
                        MessageKind::StepCompleted,
                        format!("Step '{}' failed and was skipped: {}", step, error),
                    )
                }
                FailureAction::Stall => AgentMessage::waiting(
                    Role::Coordinator,
                    format!("Step '{}' failed; waiting: {}", step, error),
                ),
                FailureAction::Abort => {
                    log::error!("Coordinator: '{}' failed, aborting run: {}", step, error);
                    AgentMessage::new(
                        Role::Coordinator,
                        MessageKind::Aborted,
                        format!("Run aborted: step '{}' failed: {}", step, error),
                    )
                }
            },
        }
    }

    fn completion(&self, in_flight: &InFlight, history: &History) -> Completion {
        match self.config.completion {
            CompletionDetection::Structured => match history.call(in_flight.call_id) {
                Some(record) => match record.status {
                    CallStatus::Success => Completion::Succeeded,
                    CallStatus::Error => {
                        Completion::Failed(record.error.clone().unwrap_or_else(|| "unknown error".into()))
                    }
                    CallStatus::Pending => Completion::Pending,
                },
                None => Completion::Pending,
            },
            CompletionDetection::TextPrefix => text_completion(in_flight, history),
        }
    }
}

/// Scan newest-first for a `Tool <name> result` / `Tool <name> error`
/// message, stopping at the message that issued the in-flight call.
fn text_completion(in_flight: &InFlight, history: &History) -> Completion {
    let tools = in_flight.step.expected_tools();
    for message in history.recent_first() {
        if message.tool_request().and_then(|(_, id, _)| id) == Some(in_flight.call_id) {
            break;
        }
        for tool in tools {
            if message.content.starts_with(&format!("Tool {} result", tool)) {
                return Completion::Succeeded;
            }
            if message.content.starts_with(&format!("Tool {} error", tool)) {
                return Completion::Failed(message.content.clone());
            }
        }
    }
    Completion::Pending
}

fn run_inline(step: StepKey, bb: &mut Blackboard) -> String {
    match step {
        StepKey::DedupeRank => {
            let before = bb.zpids().len();
            let ranked = dedupe_rank(bb.zpids());
            let after = ranked.len();
            bb.set_ranked_zpids(ranked);
            format!("Ranked {} unique ZPIDs from {}.", after, before)
        }
        StepKey::Compliance => {
            let report = check_compliance(&ComplianceInput::from_blackboard(bb));
            let note = if report.ok {
                "Compliance checks passed.".to_string()
            } else {
                format!("Compliance issues: {}", report.issues.join(" "))
            };
            bb.set_compliance(report);
            note
        }
        other => {
            log::error!("Coordinator: '{}' is not an inline step", other);
            String::new()
        }
    }
}

fn reject(step: StepKey, reason: &str) -> AgentMessage {
    log::debug!("Coordinator: rejected proposal for '{}': {}", step, reason);
    AgentMessage::deferral(Role::Coordinator, format!("Rejected proposal for '{}': {}.", step, reason))
}

fn log_transition(result: Result<(), PlanError>) {
    if let Err(e) = result {
        log::error!("Coordinator: {}", e);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
