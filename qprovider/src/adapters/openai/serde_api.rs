//! OpenAI HTTP payload serde models and conversion helpers.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::FinishReason;
use crate::adapters::http::ErrorDetail;

use super::types::{OpenAiModel, OpenAiRequest, OpenAiResponse, OpenAiToolCall, OpenAiUsage};

/// Name of the output-token limit field accepted by a model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum OpenAiTokenParameter {
    MaxTokens,
    MaxCompletionTokens,
}

impl OpenAiTokenParameter {
    /// Reasoning-era models reject `max_tokens`.
    pub(crate) fn for_model(model: &str) -> Self {
        let model = model.trim().to_ascii_lowercase();
        let model = model.rsplit('/').next().unwrap_or_default();

        if ["o1", "o3", "o4", "gpt-5"]
            .iter()
            .any(|prefix| model.starts_with(prefix))
        {
            Self::MaxCompletionTokens
        } else {
            Self::MaxTokens
        }
    }
}

pub(crate) fn build_api_request(request: OpenAiRequest) -> OpenAiApiRequest {
    let parameter = OpenAiTokenParameter::for_model(&request.model);
    build_api_request_with_token_parameter(request, parameter)
}

pub(crate) fn build_api_request_with_token_parameter(
    request: OpenAiRequest,
    parameter: OpenAiTokenParameter,
) -> OpenAiApiRequest {
    let messages = request
        .messages
        .into_iter()
        .map(|message| OpenAiApiMessage {
            role: message.role.as_str().to_string(),
            content: message.content,
        })
        .collect();

    let tools = if request.tools.is_empty() {
        None
    } else {
        Some(
            request
                .tools
                .into_iter()
                .map(|tool| OpenAiApiTool {
                    r#type: "function".to_string(),
                    function: OpenAiApiFunction {
                        name: tool.name,
                        description: tool.description,
                        parameters: tool.parameters,
                    },
                })
                .collect(),
        )
    };

    let (max_tokens, max_completion_tokens) = match parameter {
        OpenAiTokenParameter::MaxTokens => (request.max_tokens, None),
        OpenAiTokenParameter::MaxCompletionTokens => (None, request.max_tokens),
    };

    OpenAiApiRequest {
        model: request.model,
        messages,
        tools,
        temperature: request.temperature,
        top_p: request.top_p,
        max_tokens,
        max_completion_tokens,
        stream: request.stream,
    }
}

pub(crate) fn parse_finish_reason(value: Option<&str>, has_tool_calls: bool) -> FinishReason {
    match value {
        Some("stop") | None if has_tool_calls => FinishReason::ToolCalls,
        Some("stop") | None => FinishReason::Stop,
        Some("length") => FinishReason::Length,
        Some("tool_calls") | Some("function_call") => FinishReason::ToolCalls,
        Some("content_filter") => FinishReason::ContentFilter,
        Some(other) => FinishReason::Other(other.to_string()),
    }
}

pub(crate) fn extract_error_detail(body: &str) -> Option<ErrorDetail> {
    let parsed = serde_json::from_str::<OpenAiApiErrorEnvelope>(body).ok()?;
    Some(parsed.error.into())
}

#[derive(Debug, Deserialize)]
pub(crate) struct OpenAiApiErrorEnvelope {
    pub error: OpenAiApiError,
}

#[derive(Debug, Deserialize)]
pub(crate) struct OpenAiApiError {
    pub message: String,
    #[serde(default)]
    pub r#type: Option<String>,
    #[serde(default)]
    pub code: Option<Value>,
}

impl From<OpenAiApiError> for ErrorDetail {
    fn from(value: OpenAiApiError) -> Self {
        let code = value.code.and_then(|code| code.as_str().map(str::to_string));

        Self {
            message: value.message,
            discriminator: code.or(value.r#type),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct OpenAiApiRequest {
    pub model: String,
    pub messages: Vec<OpenAiApiMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<OpenAiApiTool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_completion_tokens: Option<u32>,
    pub stream: bool,
}

#[derive(Debug, Serialize)]
pub(crate) struct OpenAiApiMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct OpenAiApiTool {
    pub r#type: String,
    pub function: OpenAiApiFunction,
}

#[derive(Debug, Serialize)]
pub(crate) struct OpenAiApiFunction {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

#[derive(Debug, Deserialize)]
pub(crate) struct OpenAiApiResponse {
    #[serde(default)]
    pub model: String,
    pub choices: Vec<OpenAiApiChoice>,
    pub usage: Option<OpenAiApiUsage>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct OpenAiApiChoice {
    pub message: OpenAiApiAssistantMessage,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct OpenAiApiAssistantMessage {
    pub content: Option<String>,
    pub tool_calls: Option<Vec<OpenAiApiToolCall>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct OpenAiApiToolCall {
    pub id: Option<String>,
    pub function: OpenAiApiToolFunction,
}

#[derive(Debug, Deserialize)]
pub(crate) struct OpenAiApiToolFunction {
    pub name: String,
    #[serde(default)]
    pub arguments: String,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct OpenAiApiUsage {
    #[serde(default)]
    pub prompt_tokens: u32,
    #[serde(default)]
    pub completion_tokens: u32,
    #[serde(default)]
    pub total_tokens: u32,
}

impl OpenAiApiResponse {
    /// `None` when the backend returned no choices.
    pub(crate) fn into_response(self) -> Option<OpenAiResponse> {
        let choice = self.choices.into_iter().next()?;
        let usage = self.usage.unwrap_or_default();

        let tool_calls = choice
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|call| OpenAiToolCall {
                id: call.id,
                name: call.function.name,
                arguments: call.function.arguments,
            })
            .collect();

        Some(OpenAiResponse {
            model: self.model,
            content: choice.message.content.unwrap_or_default(),
            tool_calls,
            finish_reason: choice.finish_reason,
            usage: OpenAiUsage {
                prompt_tokens: usage.prompt_tokens,
                completion_tokens: usage.completion_tokens,
                total_tokens: usage.total_tokens,
            },
        })
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct OpenAiApiStreamResponse {
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub choices: Vec<OpenAiApiStreamChoice>,
    #[serde(default)]
    pub error: Option<OpenAiApiError>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct OpenAiApiStreamChoice {
    #[serde(default)]
    pub delta: OpenAiApiStreamDelta,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct OpenAiApiStreamDelta {
    pub content: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct OpenAiApiEmbeddingRequest {
    pub model: String,
    pub input: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct OpenAiApiEmbeddingResponse {
    pub data: Vec<OpenAiApiEmbedding>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct OpenAiApiEmbedding {
    pub embedding: Vec<f32>,
    #[serde(default)]
    pub index: usize,
}

impl OpenAiApiEmbeddingResponse {
    /// Vectors in input order.
    pub(crate) fn into_vectors(mut self) -> Vec<Vec<f32>> {
        self.data.sort_by_key(|entry| entry.index);
        self.data.into_iter().map(|entry| entry.embedding).collect()
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct OpenAiApiModelList {
    #[serde(default)]
    pub data: Vec<OpenAiApiModel>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct OpenAiApiModel {
    pub id: String,
    pub created: Option<i64>,
    pub owned_by: Option<String>,
}

impl From<OpenAiApiModel> for OpenAiModel {
    fn from(value: OpenAiApiModel) -> Self {
        Self {
            id: value.id,
            created: value.created,
            owned_by: value.owned_by,
        }
    }
}
