//! Agent messages and tool requests.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::record::CallId;
use crate::agents::Role;
use crate::plan::StepKey;

/// Upper bound on how much tool output is copied into a message's content.
/// The full payload stays on the [`ToolCallRecord`](super::ToolCallRecord).
const MAX_CONTENT_PAYLOAD: usize = 2000;

/// A deferred external call: dotted tool name plus structured arguments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolRequest {
    pub name: String,
    pub args: Map<String, Value>,
}

impl ToolRequest {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: Map::new(),
        }
    }

    pub fn with_args(name: impl Into<String>, args: Map<String, Value>) -> Self {
        Self {
            name: name.into(),
            args,
        }
    }

    /// Builder-style argument insertion.
    pub fn arg(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.args.insert(key.to_string(), value.into());
        self
    }

    /// Arguments as a JSON object value.
    pub fn args_value(&self) -> Value {
        Value::Object(self.args.clone())
    }
}

/// What a message means to the executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MessageKind {
    Info,
    /// Another step is in flight or a result has not arrived yet.
    Waiting,
    /// The agent declined to act (not its turn, precondition unmet).
    Deferral,
    ToolCall,
    ToolResult,
    ToolError,
    StepCompleted,
    /// Terminal: every step is done.
    PlanComplete,
    /// Terminal: a step policy asked to stop the run.
    Aborted,
}

impl MessageKind {
    pub fn is_terminal(&self) -> bool {
        matches!(self, MessageKind::PlanComplete | MessageKind::Aborted)
    }
}

/// Structured attachment of a message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum MessageData {
    /// A tool request. `call_id` is `None` for an agent proposal that the
    /// coordinator has not accepted yet.
    #[serde(rename_all = "camelCase")]
    ToolCall {
        call_id: Option<CallId>,
        step: StepKey,
        request: ToolRequest,
    },
    /// Reference to the record of a finished call.
    #[serde(rename_all = "camelCase")]
    ToolResult { call_id: CallId, name: String },
}

/// One entry of the run history. Never mutated once appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentMessage {
    pub from: Role,
    pub kind: MessageKind,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<MessageData>,
}

impl AgentMessage {
    pub fn new(from: Role, kind: MessageKind, content: impl Into<String>) -> Self {
        Self {
            from,
            kind,
            content: content.into(),
            data: None,
        }
    }

    pub fn info(from: Role, content: impl Into<String>) -> Self {
        Self::new(from, MessageKind::Info, content)
    }

    pub fn waiting(from: Role, content: impl Into<String>) -> Self {
        Self::new(from, MessageKind::Waiting, content)
    }

    pub fn deferral(from: Role, content: impl Into<String>) -> Self {
        Self::new(from, MessageKind::Deferral, content)
    }

    pub fn tool_call(
        from: Role,
        step: StepKey,
        call_id: Option<CallId>,
        request: ToolRequest,
        content: impl Into<String>,
    ) -> Self {
        Self {
            from,
            kind: MessageKind::ToolCall,
            content: content.into(),
            data: Some(MessageData::ToolCall {
                call_id,
                step,
                request,
            }),
        }
    }

    /// Result message in the `Tool <name> result: <payload>` wire form.
    pub fn tool_result(call_id: CallId, name: &str, payload: &str) -> Self {
        Self {
            from: Role::Executor,
            kind: MessageKind::ToolResult,
            content: format!("Tool {} result: {}", name, clip(payload)),
            data: Some(MessageData::ToolResult {
                call_id,
                name: name.to_string(),
            }),
        }
    }

    /// Failure message in the `Tool <name> error: <message>` wire form.
    pub fn tool_error(call_id: CallId, name: &str, error: &str) -> Self {
        Self {
            from: Role::Executor,
            kind: MessageKind::ToolError,
            content: format!("Tool {} error: {}", name, clip(error)),
            data: Some(MessageData::ToolResult {
                call_id,
                name: name.to_string(),
            }),
        }
    }

    /// The tool request carried by this message, if any.
    pub fn tool_request(&self) -> Option<(StepKey, Option<CallId>, &ToolRequest)> {
        match &self.data {
            Some(MessageData::ToolCall {
                call_id,
                step,
                request,
            }) => Some((*step, *call_id, request)),
            _ => None,
        }
    }
}

fn clip(text: &str) -> String {
    if text.chars().count() <= MAX_CONTENT_PAYLOAD {
        return text.to_string();
    }
    let mut clipped: String = text.chars().take(MAX_CONTENT_PAYLOAD).collect();
    clipped.push_str("...");
    clipped
}
