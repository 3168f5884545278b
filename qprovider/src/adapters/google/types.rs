//! Gemini `generateContent` payloads.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::adapters::http::ErrorDetail;
use crate::{ChatCompletionResponse, FinishReason, Model, ToolCall, Usage};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GoogleRequest {
    pub contents: Vec<GoogleContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<GoogleContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation_config: Option<GoogleGenerationConfig>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<GoogleToolSet>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoogleContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub parts: Vec<GooglePart>,
}

impl GoogleContent {
    pub fn text(role: Option<&str>, text: impl Into<String>) -> Self {
        Self {
            role: role.map(str::to_string),
            parts: vec![GooglePart {
                text: Some(text.into()),
                function_call: None,
            }],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GooglePart {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_call: Option<GoogleFunctionCall>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoogleFunctionCall {
    pub name: String,
    #[serde(default)]
    pub args: Value,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GoogleGenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_k: Option<u32>,
}

impl GoogleGenerationConfig {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GoogleToolSet {
    pub function_declarations: Vec<GoogleFunctionDeclaration>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GoogleFunctionDeclaration {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoogleResponse {
    #[serde(default)]
    pub candidates: Vec<GoogleCandidate>,
    #[serde(default)]
    pub usage_metadata: Option<GoogleUsage>,
    #[serde(default)]
    pub model_version: Option<String>,
    #[serde(default)]
    pub prompt_feedback: Option<GooglePromptFeedback>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoogleCandidate {
    #[serde(default)]
    pub content: Option<GoogleContent>,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoogleUsage {
    #[serde(default)]
    pub prompt_token_count: u32,
    #[serde(default)]
    pub candidates_token_count: u32,
    #[serde(default)]
    pub total_token_count: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GooglePromptFeedback {
    #[serde(default)]
    pub block_reason: Option<String>,
}

impl GoogleResponse {
    /// Function calls carry no id on this backend, so one is minted per call.
    pub(crate) fn into_chat_response(self, requested_model: &str) -> ChatCompletionResponse {
        let blocked = self
            .prompt_feedback
            .as_ref()
            .is_some_and(|feedback| feedback.block_reason.is_some());
        let candidate = self.candidates.into_iter().next();

        let mut text = String::new();
        let mut tool_calls = Vec::new();
        let mut finish = None;

        if let Some(candidate) = candidate {
            finish = candidate.finish_reason;
            for part in candidate.content.map(|content| content.parts).unwrap_or_default() {
                if let Some(part_text) = part.text {
                    text.push_str(&part_text);
                }
                if let Some(call) = part.function_call {
                    tool_calls.push(ToolCall::function(None, call.name, call.args.to_string()));
                }
            }
        }

        let finish_reason = if blocked && finish.is_none() {
            FinishReason::ContentFilter
        } else {
            parse_finish_reason(finish.as_deref(), !tool_calls.is_empty())
        };

        let usage = self.usage_metadata.unwrap_or_default();
        let mut usage_counts = Usage::new(usage.prompt_token_count, usage.candidates_token_count);
        usage_counts.total_tokens = usage_counts.total_tokens.max(usage.total_token_count);

        let model = self
            .model_version
            .filter(|version| !version.trim().is_empty())
            .unwrap_or_else(|| requested_model.to_string());

        ChatCompletionResponse::new(model, text, finish_reason, usage_counts, tool_calls)
    }
}

pub(crate) fn parse_finish_reason(value: Option<&str>, has_tool_calls: bool) -> FinishReason {
    match value {
        None | Some("STOP") if has_tool_calls => FinishReason::ToolCalls,
        None | Some("STOP") | Some("FINISH_REASON_UNSPECIFIED") => FinishReason::Stop,
        Some("MAX_TOKENS") => FinishReason::Length,
        Some("SAFETY") | Some("RECITATION") | Some("BLOCKLIST") | Some("PROHIBITED_CONTENT")
        | Some("SPII") => FinishReason::ContentFilter,
        Some(other) => FinishReason::Other(other.to_ascii_lowercase()),
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct GoogleErrorEnvelope {
    pub error: GoogleApiError,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GoogleApiError {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub status: Option<String>,
}

pub(crate) fn extract_error_detail(body: &str) -> Option<ErrorDetail> {
    let parsed = serde_json::from_str::<GoogleErrorEnvelope>(body).ok()?;

    Some(ErrorDetail {
        message: parsed.error.message,
        discriminator: parsed.error.status,
    })
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoogleModel {
    /// Resource name, `models/<id>`.
    pub name: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl From<GoogleModel> for Model {
    fn from(value: GoogleModel) -> Self {
        let id = value
            .name
            .strip_prefix("models/")
            .unwrap_or(&value.name)
            .to_string();
        let label = value.display_name.unwrap_or_else(|| id.clone());

        let mut model = Model::new(id, label);
        model.description = value.description.filter(|text| !text.trim().is_empty());
        model
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct GoogleModelList {
    #[serde(default)]
    pub models: Vec<GoogleModel>,
}

#[derive(Debug, Serialize)]
pub(crate) struct GoogleEmbedRequest {
    pub model: String,
    pub content: GoogleContent,
}

#[derive(Debug, Serialize)]
pub(crate) struct GoogleBatchEmbedRequest {
    pub requests: Vec<GoogleEmbedRequest>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GoogleEmbedding {
    #[serde(default)]
    pub values: Vec<f32>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GoogleEmbedResponse {
    pub embedding: GoogleEmbedding,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GoogleBatchEmbedResponse {
    #[serde(default)]
    pub embeddings: Vec<GoogleEmbedding>,
}
