//! Decision units that act on the blackboard.
//!
//! Roles are a closed set: the coordinator, one [`StepAgent`] per external
//! plan step, and the executor that reports tool results. Inline steps
//! ([`rank`], [`compliance`]) are plain functions the coordinator calls.

pub mod compliance;
pub mod rank;
pub mod step_agent;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub use step_agent::{StepAction, StepAgent};

use crate::blackboard::Blackboard;
use crate::goal::Goal;
use crate::history::History;
use crate::plan::StepKey;

/// Author of a history message.
///
/// Serialized as `"coordinator"`, `"executor"` or `"agent:<step>"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum Role {
    Coordinator,
    Agent(StepKey),
    Executor,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Coordinator => f.write_str("coordinator"),
            Role::Agent(step) => write!(f, "agent:{}", step),
            Role::Executor => f.write_str("executor"),
        }
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "coordinator" => Ok(Role::Coordinator),
            "executor" => Ok(Role::Executor),
            other => {
                let step = other
                    .strip_prefix("agent:")
                    .and_then(|key| StepKey::all().find(|k| k.as_str() == key))
                    .ok_or_else(|| format!("unknown role '{}'", other))?;
                Ok(Role::Agent(step))
            }
        }
    }
}

impl From<Role> for String {
    fn from(role: Role) -> Self {
        role.to_string()
    }
}

impl TryFrom<String> for Role {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Read-only view handed to an agent for one decision.
#[derive(Debug, Clone, Copy)]
pub struct AgentContext<'a> {
    pub goal: &'a Goal,
    pub blackboard: &'a Blackboard,
    pub history: &'a History,
}

impl<'a> AgentContext<'a> {
    pub fn new(goal: &'a Goal, blackboard: &'a Blackboard, history: &'a History) -> Self {
        Self {
            goal,
            blackboard,
            history,
        }
    }
}

/// ZPIDs on the blackboard, or those named in the goal when it has none.
pub(crate) fn known_zpids(goal: &Goal, bb: &Blackboard) -> Vec<u64> {
    if bb.zpids().is_empty() {
        goal.zpids()
    } else {
        bb.zpids().to_vec()
    }
}
