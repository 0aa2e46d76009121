use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::frame::Frame;

/// Typed event produced from one decoded frame.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AgentEvent {
    /// LLM output text. Passed through as sent; whether it is a delta or the
    /// full text so far is up to the consumer.
    ContentDelta { text: String },
    SessionAssigned { session_id: String },
    ToolStarted {
        name: String,
        arguments: Map<String, Value>,
        is_skill: bool,
    },
    /// Tool failures arrive here as `success: false`, not as errors.
    ToolEnded {
        name: String,
        success: bool,
        result: String,
    },
    SkillActivated { name: String, success: bool },
    /// The backend is blocked until the approval is resolved through
    /// `ApprovalGateway`.
    ApprovalRequired {
        approval_id: String,
        tool_name: String,
        arguments: Map<String, Value>,
    },
    StreamCompleted {
        visited_files: Vec<String>,
        activated_skills: Vec<String>,
        tool_call_count: u64,
    },
    StreamError { message: String },
}

#[derive(Deserialize)]
struct SessionPayload {
    session_id: String,
}

#[derive(Deserialize)]
struct ToolStartPayload {
    name: String,
    #[serde(default)]
    arguments: Map<String, Value>,
    #[serde(default)]
    is_skill: bool,
}

#[derive(Deserialize)]
struct ToolEndPayload {
    name: String,
    success: bool,
    #[serde(default)]
    result: String,
}

#[derive(Deserialize)]
struct SkillPayload {
    name: String,
    success: bool,
}

#[derive(Deserialize)]
struct ApprovalPayload {
    approval_id: String,
    tool_name: String,
    #[serde(default)]
    arguments: Map<String, Value>,
}

#[derive(Deserialize)]
struct DonePayload {
    #[serde(default)]
    visited_files: Vec<String>,
    #[serde(default)]
    activated_skills: Vec<String>,
    #[serde(default)]
    tool_calls: u64,
}

impl AgentEvent {
    /// Types a frame.
    ///
    /// Returns `None` for empty or non-JSON payloads and for payload shapes
    /// that do not fit the event type. Such frames are dropped without
    /// affecting later ones.
    pub fn from_frame(frame: &Frame) -> Option<AgentEvent> {
        if frame.payload.trim().is_empty() {
            return None;
        }
        let value: Value = match serde_json::from_str(&frame.payload) {
            Ok(value) => value,
            Err(err) => {
                debug!(event_type = %frame.event_type, error = %err, "dropping frame with non-JSON payload");
                return None;
            }
        };

        let event = match frame.event_type.as_str() {
            "content" => match value {
                Value::String(text) => Some(AgentEvent::ContentDelta { text }),
                _ => None,
            },
            "session" => decode::<SessionPayload>(value)
                .map(|p| AgentEvent::SessionAssigned { session_id: p.session_id }),
            "tool_start" => decode::<ToolStartPayload>(value).map(|p| AgentEvent::ToolStarted {
                name: p.name,
                arguments: p.arguments,
                is_skill: p.is_skill,
            }),
            "tool_end" => decode::<ToolEndPayload>(value).map(|p| AgentEvent::ToolEnded {
                name: p.name,
                success: p.success,
                result: p.result,
            }),
            "skill_activated" => {
                decode::<SkillPayload>(value).map(|p| AgentEvent::SkillActivated {
                    name: p.name,
                    success: p.success,
                })
            }
            "approval_required" => {
                decode::<ApprovalPayload>(value).map(|p| AgentEvent::ApprovalRequired {
                    approval_id: p.approval_id,
                    tool_name: p.tool_name,
                    arguments: p.arguments,
                })
            }
            "done" => decode::<DonePayload>(value).map(|p| AgentEvent::StreamCompleted {
                visited_files: p.visited_files,
                activated_skills: p.activated_skills,
                tool_call_count: p.tool_calls,
            }),
            "error" => error_message(&value)
                .or_else(|| value.as_str().map(ToOwned::to_owned))
                .map(|message| AgentEvent::StreamError { message }),
            _ => fallback(value),
        };

        if event.is_none() {
            debug!(event_type = %frame.event_type, "dropping frame with unexpected payload shape");
        }
        event
    }

    /// Calls the handler method matching this event's kind.
    pub fn dispatch<H: EventHandler + ?Sized>(&self, handler: &mut H) {
        match self {
            AgentEvent::ContentDelta { text } => handler.on_content(text),
            AgentEvent::SessionAssigned { session_id } => handler.on_session(session_id),
            AgentEvent::ToolStarted {
                name,
                arguments,
                is_skill,
            } => handler.on_tool_started(name, arguments, *is_skill),
            AgentEvent::ToolEnded {
                name,
                success,
                result,
            } => handler.on_tool_ended(name, *success, result),
            AgentEvent::SkillActivated { name, success } => {
                handler.on_skill_activated(name, *success)
            }
            AgentEvent::ApprovalRequired {
                approval_id,
                tool_name,
                arguments,
            } => handler.on_approval_required(approval_id, tool_name, arguments),
            AgentEvent::StreamCompleted {
                visited_files,
                activated_skills,
                tool_call_count,
            } => handler.on_completed(visited_files, activated_skills, *tool_call_count),
            AgentEvent::StreamError { message } => handler.on_error(message),
        }
    }

    /// Returns true for `StreamCompleted` and `StreamError`.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AgentEvent::StreamCompleted { .. } | AgentEvent::StreamError { .. }
        )
    }
}

/// Untyped frames: a bare string is content, an object carrying `error` is an
/// error, anything else is dropped.
fn fallback(value: Value) -> Option<AgentEvent> {
    match value {
        Value::String(text) => Some(AgentEvent::ContentDelta { text }),
        Value::Object(_) => {
            error_message(&value).map(|message| AgentEvent::StreamError { message })
        }
        _ => None,
    }
}

fn error_message(value: &Value) -> Option<String> {
    match value.get("error")? {
        Value::String(message) => Some(message.clone()),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

fn decode<T: serde::de::DeserializeOwned>(value: Value) -> Option<T> {
    serde_json::from_value(value).ok()
}

/// Consumer callbacks, one per event kind. Every method defaults to a no-op.
#[allow(unused_variables)]
pub trait EventHandler {
    fn on_content(&mut self, text: &str) {}
    fn on_session(&mut self, session_id: &str) {}
    fn on_tool_started(&mut self, name: &str, arguments: &Map<String, Value>, is_skill: bool) {}
    fn on_tool_ended(&mut self, name: &str, success: bool, result: &str) {}
    fn on_skill_activated(&mut self, name: &str, success: bool) {}
    fn on_approval_required(
        &mut self,
        approval_id: &str,
        tool_name: &str,
        arguments: &Map<String, Value>,
    ) {
    }
    fn on_completed(
        &mut self,
        visited_files: &[String],
        activated_skills: &[String],
        tool_call_count: u64,
    ) {
    }
    fn on_error(&mut self, message: &str) {}
}
