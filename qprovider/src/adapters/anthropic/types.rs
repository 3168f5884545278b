//! Anthropic Messages API payloads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::adapters::http::ErrorDetail;
use crate::{ChatCompletionResponse, FinishReason, Model, ToolCall, Usage};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnthropicRequest {
    pub model: String,
    pub max_tokens: u32,
    pub messages: Vec<AnthropicMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_k: Option<u32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<AnthropicTool>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub stream: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnthropicMessage {
    pub role: &'static str,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnthropicTool {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AnthropicResponse {
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub content: Vec<AnthropicContentBlock>,
    pub stop_reason: Option<String>,
    #[serde(default)]
    pub usage: AnthropicUsage,
}

impl AnthropicResponse {
    pub(crate) fn into_chat_response(self, fallback_model: &str) -> ChatCompletionResponse {
        let mut text = String::new();
        let mut tool_calls = Vec::new();

        for block in self.content {
            match block {
                AnthropicContentBlock::Text { text: part } => text.push_str(&part),
                AnthropicContentBlock::ToolUse { id, name, input } => {
                    tool_calls.push(ToolCall::function(Some(id), name, input.to_string()));
                }
                AnthropicContentBlock::Other => {}
            }
        }

        let model = if self.model.trim().is_empty() {
            fallback_model.to_string()
        } else {
            self.model
        };

        ChatCompletionResponse::new(
            model,
            text,
            parse_stop_reason(self.stop_reason.as_deref()),
            Usage::new(self.usage.input_tokens, self.usage.output_tokens),
            tool_calls,
        )
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AnthropicContentBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        #[serde(default)]
        input: Value,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub struct AnthropicUsage {
    #[serde(default)]
    pub input_tokens: u32,
    #[serde(default)]
    pub output_tokens: u32,
}

/// Server-sent events of a streamed message, reduced to what chunking needs.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AnthropicStreamEvent {
    MessageStart {
        message: AnthropicStreamMessage,
    },
    ContentBlockDelta {
        delta: AnthropicDelta,
    },
    MessageDelta {
        delta: AnthropicMessageDelta,
    },
    MessageStop,
    Error {
        error: AnthropicApiError,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AnthropicStreamMessage {
    #[serde(default)]
    pub model: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AnthropicDelta {
    TextDelta {
        text: String,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AnthropicMessageDelta {
    pub stop_reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AnthropicApiError {
    #[serde(rename = "type")]
    pub kind: String,
    pub message: String,
}

impl From<AnthropicApiError> for ErrorDetail {
    fn from(value: AnthropicApiError) -> Self {
        Self {
            message: value.message,
            discriminator: Some(value.kind),
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct AnthropicErrorEnvelope {
    pub error: AnthropicApiError,
}

pub(crate) fn extract_error_detail(body: &str) -> Option<ErrorDetail> {
    let parsed = serde_json::from_str::<AnthropicErrorEnvelope>(body).ok()?;
    Some(parsed.error.into())
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AnthropicModel {
    pub id: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl From<AnthropicModel> for Model {
    fn from(value: AnthropicModel) -> Self {
        let label = value.display_name.unwrap_or_else(|| value.id.clone());
        let mut model = Model::new(value.id, label);
        model.created = value.created_at;
        model
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct AnthropicModelList {
    #[serde(default)]
    pub data: Vec<AnthropicModel>,
}

pub(crate) fn parse_stop_reason(value: Option<&str>) -> FinishReason {
    match value {
        None | Some("end_turn") | Some("stop_sequence") => FinishReason::Stop,
        Some("max_tokens") => FinishReason::Length,
        Some("tool_use") => FinishReason::ToolCalls,
        Some("refusal") => FinishReason::ContentFilter,
        Some(other) => FinishReason::Other(other.to_string()),
    }
}
