//! Append-only run history.
//!
//! [`History`] holds every [`AgentMessage`] produced during a run, in order,
//! plus the [`ToolCallRecord`] of each dispatched call. Messages are never
//! changed after they are appended; a call record moves from `pending` to
//! `success` or `error` exactly once.

pub mod message;
pub mod record;

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use message::{AgentMessage, MessageData, MessageKind, ToolRequest};
pub use record::{CallId, CallStatus, ToolCallRecord};

use crate::plan::StepKey;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct History {
    messages: Vec<AgentMessage>,
    calls: Vec<ToolCallRecord>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    // --- Messages ---

    pub fn push(&mut self, message: AgentMessage) {
        log::trace!("History: [{}] {}", message.from, message.content);
        self.messages.push(message);
    }

    pub fn messages(&self) -> &[AgentMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&AgentMessage> {
        self.messages.last()
    }

    /// Messages from newest to oldest.
    pub fn recent_first(&self) -> impl Iterator<Item = &AgentMessage> {
        self.messages.iter().rev()
    }

    // --- Tool calls ---

    /// Next unused call id.
    ///
    /// Ids already attached to tool-call messages count as used even if the
    /// executor has not opened a record for them yet.
    pub fn next_call_id(&self) -> CallId {
        let from_records = self.calls.iter().map(|c| c.id.0).max().unwrap_or(0);
        let from_messages = self
            .messages
            .iter()
            .filter_map(|m| m.tool_request().and_then(|(_, id, _)| id))
            .map(|id| id.0)
            .max()
            .unwrap_or(0);
        CallId(from_records.max(from_messages) + 1)
    }

    /// Register a call as pending before it is awaited.
    pub fn open_call(&mut self, id: CallId, step: Option<StepKey>, request: &ToolRequest) {
        self.calls
            .push(ToolCallRecord::pending(id, step, &request.name, request.args_value()));
    }

    /// Resolve a pending call as successful.
    pub fn complete_call(&mut self, id: CallId, payload: String, attempts: u32) {
        if let Some(record) = self.pending_call_mut(id) {
            record.status = CallStatus::Success;
            record.payload = Some(payload);
            record.attempts = attempts;
        }
    }

    /// Resolve a pending call as failed.
    pub fn fail_call(&mut self, id: CallId, error: String, attempts: u32) {
        if let Some(record) = self.pending_call_mut(id) {
            record.status = CallStatus::Error;
            record.error = Some(error);
            record.attempts = attempts;
        }
    }

    pub fn call(&self, id: CallId) -> Option<&ToolCallRecord> {
        self.calls.iter().find(|c| c.id == id)
    }

    pub fn calls(&self) -> &[ToolCallRecord] {
        &self.calls
    }

    /// Most recent call still waiting for its outcome.
    pub fn pending_call(&self) -> Option<&ToolCallRecord> {
        self.calls.iter().rev().find(|c| c.status == CallStatus::Pending)
    }

    /// The last `n` calls, oldest first.
    pub fn recent_calls(&self, n: usize) -> &[ToolCallRecord] {
        let start = self.calls.len().saturating_sub(n);
        &self.calls[start..]
    }

    /// Full history as JSON.
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    fn pending_call_mut(&mut self, id: CallId) -> Option<&mut ToolCallRecord> {
        let record = self
            .calls
            .iter_mut()
            .find(|c| c.id == id && c.status == CallStatus::Pending);
        if record.is_none() {
            log::warn!("History: no pending call {}", id);
        }
        record
    }
}
