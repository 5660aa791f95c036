//! Round executor: the bounded control loop of a run.
//!
//! Each round one role acts: in coordinator mode always the coordinator,
//! in round-robin mode the coordinator followed by every step agent in plan
//! order. A message carrying an accepted tool request is dispatched before
//! the round ends, so no two calls are ever in flight together. The loop
//! stops on a terminal message or when the round budget runs out; an
//! exhausted budget is not an error, the outcome just reports partial state.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::agents::{AgentContext, Role, StepAgent};
use crate::blackboard::{merge_tool_result, Blackboard, Phase};
use crate::config::{ExecutionMode, RunConfig};
use crate::coordinator::Coordinator;
use crate::goal::Goal;
use crate::history::{AgentMessage, CallId, History, ToolRequest};
use crate::plan::{Plan, StepKey};
use crate::report::ReportCompiler;
use crate::tools::{ToolError, ToolInvoker};

/// Everything a run produced.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunOutcome {
    pub run_id: Uuid,
    pub goal: Goal,
    pub blackboard: Blackboard,
    pub history: History,
    pub rounds_used: usize,
    /// Every plan step reached `done`.
    pub completed: bool,
    pub report: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RunOutcome {
    /// Wall-clock duration of the run in milliseconds.
    pub fn elapsed_ms(&self) -> i64 {
        (self.finished_at - self.started_at).num_milliseconds()
    }
}

pub struct RoundExecutor {
    invoker: Arc<dyn ToolInvoker>,
    config: RunConfig,
}

impl RoundExecutor {
    pub fn new(invoker: Arc<dyn ToolInvoker>, config: RunConfig) -> Self {
        Self { invoker, config }
    }

    /// Run a goal from an empty blackboard and history.
    pub async fn run(&self, goal: Goal) -> RunOutcome {
        self.run_with(goal, Blackboard::new(), History::new()).await
    }

    /// Run a goal over a possibly pre-seeded blackboard and history.
    pub async fn run_with(&self, goal: Goal, mut bb: Blackboard, mut history: History) -> RunOutcome {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        log::info!(
            "Run {}: starting ({:?} mode, {} rounds): {}",
            run_id,
            self.config.mode,
            self.config.max_rounds,
            goal.as_str()
        );

        let coordinator =
            Coordinator::new(self.config.clone()).delegating(self.config.mode == ExecutionMode::RoundRobin);
        let turn_order = self.turn_order();

        let mut rounds_used = 0;
        for round in 0..self.config.max_rounds {
            rounds_used += 1;
            let role = turn_order[round % turn_order.len()];
            log::debug!("Run {}: round {} ({})", run_id, rounds_used, role);

            let message = self.play_turn(role, &coordinator, &goal, &mut bb, &mut history).await;
            if message.kind.is_terminal() {
                log::info!("Run {}: stopping after round {}: {}", run_id, rounds_used, message.content);
                break;
            }
        }

        log::debug!(
            "Run {}: fields written by coordinator={} executor={}",
            run_id,
            bb.phase_writes(Role::Coordinator),
            bb.phase_writes(Role::Executor)
        );
        let completed = bb.plan().is_some_and(Plan::is_complete);
        if !completed {
            log::info!("Run {}: round budget used up with plan incomplete", run_id);
        }

        let report = ReportCompiler::new(self.config.trace_len).compile(&goal, &bb, &history);
        let finished_at = Utc::now();
        log::info!(
            "Run {}: finished in {} ms, {} rounds, completed={}",
            run_id,
            (finished_at - started_at).num_milliseconds(),
            rounds_used,
            completed
        );

        RunOutcome {
            run_id,
            goal,
            blackboard: bb,
            history,
            rounds_used,
            completed,
            report,
            started_at,
            finished_at,
        }
    }

    fn turn_order(&self) -> Vec<Role> {
        match self.config.mode {
            ExecutionMode::Coordinator => vec![Role::Coordinator],
            ExecutionMode::RoundRobin => std::iter::once(Role::Coordinator)
                .chain(StepAgent::ALL.iter().map(StepAgent::role))
                .collect(),
        }
    }

    /// One round: let `role` act, record its message, dispatch an accepted
    /// request. Returns the message that decides whether the run goes on.
    async fn play_turn(
        &self,
        role: Role,
        coordinator: &Coordinator,
        goal: &Goal,
        bb: &mut Blackboard,
        history: &mut History,
    ) -> AgentMessage {
        let message = {
            let mut phase = Phase::begin(bb, role);
            match role {
                Role::Coordinator => coordinator.think(goal, phase.bb(), history),
                Role::Agent(step) => match StepAgent::for_step(step) {
                    Some(agent) => agent.think(&AgentContext::new(goal, phase.bb_ref(), history)),
                    None => AgentMessage::deferral(role, format!("No agent acts for '{}'.", step)),
                },
                Role::Executor => AgentMessage::deferral(role, "The executor takes no turns."),
            }
        };
        history.push(message.clone());

        // A proposal has no call id until the coordinator accepts it.
        let message = match message.tool_request() {
            Some((_, None, _)) => {
                let accepted = coordinator.accept_proposal(&message, bb, history);
                history.push(accepted.clone());
                accepted
            }
            _ => message,
        };

        if let Some((step, Some(call_id), request)) = message.tool_request() {
            let request = request.clone();
            self.dispatch(step, call_id, &request, bb, history).await;
        }
        message
    }

    /// Invoke the tool with the step's retry and timeout policy, record the
    /// outcome, and merge a successful payload into the blackboard.
    async fn dispatch(
        &self,
        step: StepKey,
        call_id: CallId,
        request: &ToolRequest,
        bb: &mut Blackboard,
        history: &mut History,
    ) {
        let policy = self.config.policy_for(step);
        let args = request.args_value();
        history.open_call(call_id, Some(step), request);

        let mut attempts = 0;
        loop {
            attempts += 1;
            let result = match policy.timeout() {
                Some(limit) => tokio::time::timeout(limit, self.invoker.invoke(&request.name, &args))
                    .await
                    .unwrap_or_else(|_| {
                        Err(ToolError::Timeout {
                            tool: request.name.clone(),
                            secs: limit.as_secs(),
                        })
                    }),
                None => self.invoker.invoke(&request.name, &args).await,
            };

            match result {
                Ok(payload) => {
                    log::debug!("{} {} succeeded after {} attempt(s)", call_id, request.name, attempts);
                    history.push(AgentMessage::tool_result(call_id, &request.name, &payload));
                    {
                        let mut phase = Phase::begin(bb, Role::Executor);
                        merge_tool_result(phase.bb(), request, &payload);
                    }
                    history.complete_call(call_id, payload, attempts);
                    return;
                }
                Err(e) if attempts < policy.max_attempts() => {
                    log::warn!(
                        "{} {} failed (attempt {}/{}), retrying: {}",
                        call_id,
                        request.name,
                        attempts,
                        policy.max_attempts(),
                        e
                    );
                }
                Err(e) => {
                    let error = e.to_string();
                    log::warn!("{} {} failed after {} attempt(s): {}", call_id, request.name, attempts, error);
                    history.fail_call(call_id, error.clone(), attempts);
                    history.push(AgentMessage::tool_error(call_id, &request.name, &error));
                    return;
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
