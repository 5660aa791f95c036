//! Typed tool-call records.
//!
//! Each dispatched tool call gets a [`ToolCallRecord`] keyed by a
//! [`CallId`]. The coordinator checks the record's status to decide whether
//! the in-flight step completed, instead of reading message text.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::plan::StepKey;

/// Per-run call identifier, allocated in dispatch order starting at 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CallId(pub u64);

impl fmt::Display for CallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "call-{}", self.0)
    }
}

/// Status of a dispatched tool call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallStatus {
    Pending,
    Success,
    Error,
}

impl fmt::Display for CallStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallStatus::Pending => write!(f, "pending"),
            CallStatus::Success => write!(f, "success"),
            CallStatus::Error => write!(f, "error"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCallRecord {
    pub id: CallId,
    /// Step the call was issued for.
    pub step: Option<StepKey>,
    /// Dotted tool name.
    pub name: String,
    pub args: Value,
    pub status: CallStatus,
    /// Raw result text on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<String>,
    /// Last error message on failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Dispatch attempts made, including retries.
    pub attempts: u32,
}

impl ToolCallRecord {
    pub fn pending(id: CallId, step: Option<StepKey>, name: impl Into<String>, args: Value) -> Self {
        Self {
            id,
            step,
            name: name.into(),
            args,
            status: CallStatus::Pending,
            payload: None,
            error: None,
            attempts: 0,
        }
    }

    /// Step the call belongs to, falling back to the tool name for records
    /// that were seeded without one.
    pub fn step_key(&self) -> Option<StepKey> {
        self.step.or_else(|| StepKey::for_tool(&self.name))
    }

    pub fn is_success(&self) -> bool {
        self.status == CallStatus::Success
    }

    pub fn is_error(&self) -> bool {
        self.status == CallStatus::Error
    }
}
