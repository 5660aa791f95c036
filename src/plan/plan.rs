//! The ordered plan and its single-flight state machine.

use serde::{Deserialize, Serialize};

use super::step::{PlanStep, StepKey, StepOutcome, StepStatus, STEP_TABLE};
use crate::error::PlanError;
use crate::history::CallId;

/// The step currently waiting on a tool result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InFlight {
    pub step: StepKey,
    pub call_id: CallId,
    pub tool: String,
}

/// Ordered list of steps for one goal.
///
/// Keys and their order are fixed at construction. Status changes go
/// through [`start`](Plan::start) and [`finish`](Plan::finish), which
/// reject anything outside `pending → running → done` / `pending → done`
/// and keep the in-flight slot consistent with the running step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Plan {
    pub goal: String,
    steps: Vec<PlanStep>,
    #[serde(default)]
    in_flight: Option<InFlight>,
}

impl Plan {
    /// Build the fixed plan for a goal.
    pub fn new(goal: impl Into<String>) -> Self {
        Self {
            goal: goal.into(),
            steps: STEP_TABLE.iter().map(|(key, _)| PlanStep::new(*key)).collect(),
            in_flight: None,
        }
    }

    pub fn steps(&self) -> &[PlanStep] {
        &self.steps
    }

    pub fn step(&self, key: StepKey) -> Option<&PlanStep> {
        self.steps.iter().find(|s| s.key == key)
    }

    pub fn status(&self, key: StepKey) -> Option<StepStatus> {
        self.step(key).map(|s| s.status)
    }

    pub fn in_flight(&self) -> Option<&InFlight> {
        self.in_flight.as_ref()
    }

    pub fn in_flight_step_key(&self) -> Option<StepKey> {
        self.in_flight.as_ref().map(|f| f.step)
    }

    /// The running step if any, else the first pending step in plan order.
    pub fn current(&self) -> Option<&PlanStep> {
        self.steps
            .iter()
            .find(|s| s.is_running())
            .or_else(|| self.steps.iter().find(|s| s.is_pending()))
    }

    pub fn is_complete(&self) -> bool {
        self.steps.iter().all(PlanStep::is_done)
    }

    /// Number of steps that reached `done`.
    pub fn done_count(&self) -> usize {
        self.steps.iter().filter(|s| s.is_done()).count()
    }

    /// Mark a pending step `running` and record its call as in flight.
    pub fn start(&mut self, key: StepKey, call_id: CallId, tool: impl Into<String>) -> Result<(), PlanError> {
        if let Some(running) = self.steps.iter().find(|s| s.is_running()) {
            debug_assert!(false, "single-flight violated: {} running, {} requested", running.key, key);
            return Err(PlanError::AlreadyRunning {
                running: running.key,
                requested: key,
            });
        }

        let step = self.step_mut(key)?;
        if step.status != StepStatus::Pending {
            let from = step.status;
            debug_assert!(false, "invalid transition for {}: {} -> running", key, from);
            return Err(PlanError::InvalidTransition {
                step: key,
                from,
                to: StepStatus::Running,
            });
        }
        step.status = StepStatus::Running;

        self.in_flight = Some(InFlight {
            step: key,
            call_id,
            tool: tool.into(),
        });
        log::debug!("Plan: step '{}' running", key);
        self.check_invariants();
        Ok(())
    }

    /// Mark a step `done`.
    ///
    /// A running step releases the in-flight slot. A pending step goes
    /// straight to `done`, which is how skips and inline steps finish.
    pub fn finish(&mut self, key: StepKey, outcome: StepOutcome) -> Result<(), PlanError> {
        let step = self.step_mut(key)?;
        let from = step.status;
        if from == StepStatus::Done {
            debug_assert!(false, "invalid transition for {}: done -> done", key);
            return Err(PlanError::InvalidTransition {
                step: key,
                from,
                to: StepStatus::Done,
            });
        }
        step.status = StepStatus::Done;
        step.outcome = Some(outcome);

        if from == StepStatus::Running {
            self.in_flight = None;
        }
        log::debug!("Plan: step '{}' {} -> done ({:?})", key, from, outcome);
        self.check_invariants();
        Ok(())
    }

    fn step_mut(&mut self, key: StepKey) -> Result<&mut PlanStep, PlanError> {
        self.steps
            .iter_mut()
            .find(|s| s.key == key)
            .ok_or(PlanError::UnknownStep(key))
    }

    /// At most one running step, and the in-flight slot points at it.
    fn check_invariants(&self) {
        let running: Vec<StepKey> = self
            .steps
            .iter()
            .filter(|s| s.is_running())
            .map(|s| s.key)
            .collect();
        debug_assert!(running.len() <= 1, "more than one running step: {:?}", running);
        debug_assert_eq!(
            running.first().copied(),
            self.in_flight_step_key(),
            "in-flight slot out of sync with running step"
        );
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
