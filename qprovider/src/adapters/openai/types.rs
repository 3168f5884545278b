//! OpenAI adapter types and provider-agnostic conversion logic.

use std::fmt::Formatter;

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::{
    ChatCompletionResponse, ChatMessage, Model, Role, SecretString, StreamChunk, ToolCall,
    ToolDefinition, Usage,
};

use super::serde_api::parse_finish_reason;

#[derive(Debug, Clone, PartialEq)]
pub struct OpenAiRequest {
    pub model: String,
    pub messages: Vec<OpenAiMessage>,
    pub tools: Vec<OpenAiTool>,
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
    pub max_tokens: Option<u32>,
    pub stream: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenAiMessage {
    pub role: OpenAiRole,
    pub content: String,
}

impl OpenAiMessage {
    pub fn new(role: OpenAiRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

impl From<&ChatMessage> for OpenAiMessage {
    fn from(value: &ChatMessage) -> Self {
        Self::new(value.role.into(), value.text())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenAiRole {
    System,
    User,
    Assistant,
}

impl OpenAiRole {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

impl From<Role> for OpenAiRole {
    fn from(value: Role) -> Self {
        match value {
            Role::System => Self::System,
            Role::User => Self::User,
            Role::Assistant => Self::Assistant,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OpenAiTool {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

impl From<&ToolDefinition> for OpenAiTool {
    fn from(value: &ToolDefinition) -> Self {
        Self {
            name: value.name.clone(),
            description: value.description.clone(),
            parameters: value.parameters.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenAiResponse {
    pub model: String,
    pub content: String,
    pub tool_calls: Vec<OpenAiToolCall>,
    pub finish_reason: Option<String>,
    pub usage: OpenAiUsage,
}

impl OpenAiResponse {
    pub(crate) fn into_chat_response(self, fallback_model: &str) -> ChatCompletionResponse {
        let finish_reason =
            parse_finish_reason(self.finish_reason.as_deref(), !self.tool_calls.is_empty());
        let model = if self.model.trim().is_empty() {
            fallback_model.to_string()
        } else {
            self.model
        };

        ChatCompletionResponse::new(
            model,
            self.content,
            finish_reason,
            self.usage.into(),
            self.tool_calls.into_iter().map(ToolCall::from).collect(),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenAiToolCall {
    pub id: Option<String>,
    pub name: String,
    pub arguments: String,
}

impl From<OpenAiToolCall> for ToolCall {
    fn from(value: OpenAiToolCall) -> Self {
        ToolCall::function(value.id, value.name, value.arguments)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OpenAiUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

impl From<OpenAiUsage> for Usage {
    fn from(value: OpenAiUsage) -> Self {
        let computed = value.prompt_tokens.saturating_add(value.completion_tokens);

        Self {
            prompt_tokens: value.prompt_tokens,
            completion_tokens: value.completion_tokens,
            total_tokens: value.total_tokens.max(computed),
        }
    }
}

/// One decoded server-sent event of a chat completion stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenAiStreamChunk {
    pub model: String,
    pub delta: Option<String>,
    pub finish_reason: Option<String>,
}

impl OpenAiStreamChunk {
    pub(crate) fn into_stream_chunk(self) -> StreamChunk {
        StreamChunk {
            model: self.model,
            text: self.delta.filter(|delta| !delta.is_empty()),
            finish_reason: self
                .finish_reason
                .as_deref()
                .map(|reason| parse_finish_reason(Some(reason), false)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenAiEmbeddingRequest {
    pub model: String,
    pub input: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenAiModel {
    pub id: String,
    pub created: Option<i64>,
    pub owned_by: Option<String>,
}

impl From<OpenAiModel> for Model {
    fn from(value: OpenAiModel) -> Self {
        let mut model = Model::new(value.id.clone(), value.id);
        model.created = value
            .created
            .and_then(|seconds| DateTime::<Utc>::from_timestamp(seconds, 0));
        model.description = value.owned_by.map(|owner| format!("owned by {owner}"));
        model
    }
}

#[derive(Clone, PartialEq, Eq)]
pub enum OpenAiAuth {
    ApiKey(SecretString),
    /// Local OpenAI-compatible servers that take no credential.
    Anonymous,
}

impl std::fmt::Debug for OpenAiAuth {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ApiKey(_) => f.write_str("OpenAiAuth::ApiKey([REDACTED])"),
            Self::Anonymous => f.write_str("OpenAiAuth::Anonymous"),
        }
    }
}
