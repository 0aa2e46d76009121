use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::ClientError;

/// Longest message the backend accepts, in characters.
pub const MAX_MESSAGE_CHARS: usize = 10_000;

/// Body of `POST /api/chat` and `POST /api/chat/stream`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(
        rename = "llm_provider",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub provider: Option<String>,
    pub stream: bool,
}

impl ChatRequest {
    /// Creates a streaming request for a new conversation.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            session_id: None,
            provider: None,
            stream: true,
        }
    }

    /// Continues an existing conversation.
    pub fn session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    /// Selects the LLM provider (`gemini`, `openai`).
    pub fn provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    pub(crate) fn streaming(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }

    pub(crate) fn validate(&self) -> Result<(), ClientError> {
        if self.message.trim().is_empty() {
            return Err(ClientError::Validation("message must not be empty".into()));
        }
        let chars = self.message.chars().count();
        if chars > MAX_MESSAGE_CHARS {
            return Err(ClientError::Validation(format!(
                "message is {chars} characters, limit is {MAX_MESSAGE_CHARS}"
            )));
        }
        if self
            .session_id
            .as_deref()
            .is_some_and(|id| id.trim().is_empty())
        {
            return Err(ClientError::Validation(
                "session_id must not be blank".into(),
            ));
        }
        Ok(())
    }
}

/// Reply to a non-streaming turn.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChatResponse {
    pub session_id: String,
    pub content: String,
    #[serde(default)]
    pub tool_calls: Vec<Value>,
    #[serde(default)]
    pub tool_results: Vec<Value>,
    #[serde(default)]
    pub thinking: Option<String>,
    #[serde(default)]
    pub visited_files: Vec<String>,
}

/// Entry of `GET /api/sessions`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
    pub llm_provider: String,
    #[serde(default)]
    pub tool_call_count: u64,
}

/// Body of `GET /api/sessions/{id}`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SessionDetail {
    pub id: String,
    #[serde(default)]
    pub messages: Vec<Value>,
    #[serde(default)]
    pub visited_files: Vec<String>,
}

/// Body of `GET /api/settings`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerSettings {
    pub llm_provider: String,
    #[serde(default)]
    pub allowed_paths: Vec<String>,
    pub safety_mode: String,
    #[serde(default)]
    pub available_tools: Vec<String>,
}

/// Body of `GET /api/health`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    #[serde(default)]
    pub service: Option<String>,
}
