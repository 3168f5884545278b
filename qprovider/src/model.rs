//! Provider-agnostic message, request, response, and catalog types.
//!
//! ```rust
//! use qprovider::{ChatCompletionRequest, ChatMessage, ChatOptions, ProviderErrorKind};
//!
//! let request = ChatCompletionRequest::new(vec![ChatMessage::user("Summarize this diff")])
//!     .with_options(ChatOptions::default().with_model("gpt-4o-mini").with_temperature(0.2));
//! assert!(request.validate("openai").is_ok());
//!
//! let err = ChatCompletionRequest::new(Vec::new())
//!     .validate("openai")
//!     .expect_err("empty requests are rejected");
//! assert_eq!(err.kind, ProviderErrorKind::InvalidRequest);
//! ```

use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{ProviderError, extract_output_variables};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

impl Display for Role {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Message payload. Only text exists today; further kinds extend the tag set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessageContent {
    Text { text: String },
}

impl MessageContent {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    pub fn as_text(&self) -> &str {
        match self {
            Self::Text { text } => text,
        }
    }
}

impl From<&str> for MessageContent {
    fn from(value: &str) -> Self {
        Self::text(value)
    }
}

impl From<String> for MessageContent {
    fn from(value: String) -> Self {
        Self::text(value)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub role: Role,
    pub content: MessageContent,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<ChatOptions>,
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<MessageContent>) -> Self {
        Self {
            role,
            content: content.into(),
            provider_id: None,
            options: None,
            timestamp: Utc::now(),
        }
    }

    pub fn system(content: impl Into<MessageContent>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<MessageContent>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<MessageContent>) -> Self {
        Self::new(Role::Assistant, content)
    }

    pub fn with_provider(mut self, provider_id: impl Into<String>) -> Self {
        self.provider_id = Some(provider_id.into());
        self
    }

    pub fn with_options(mut self, options: ChatOptions) -> Self {
        self.options = Some(options);
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn text(&self) -> &str {
        self.content.as_text()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    /// JSON schema of the function arguments.
    pub parameters: Value,
}

impl ToolDefinition {
    pub fn new(name: impl Into<String>, description: impl Into<String>, parameters: Value) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolCallKind {
    #[default]
    Function,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    /// Arguments as a JSON document string.
    pub arguments: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: ToolCallKind,
    pub function: FunctionCall,
}

impl ToolCall {
    /// Builds a function call, minting an id when the backend did not report one.
    pub fn function(id: Option<String>, name: impl Into<String>, arguments: impl Into<String>) -> Self {
        let id = id
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(qcommon::generate_tool_call_id);

        Self {
            id,
            kind: ToolCallKind::Function,
            function: FunctionCall {
                name: name.into(),
                arguments: arguments.into(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_probability: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_k_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_message: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolDefinition>,
}

impl ChatOptions {
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_top_probability(mut self, top_probability: f32) -> Self {
        self.top_probability = Some(top_probability);
        self
    }

    pub fn with_top_k_tokens(mut self, top_k_tokens: u32) -> Self {
        self.top_k_tokens = Some(top_k_tokens);
        self
    }

    pub fn with_system_message(mut self, system_message: impl Into<String>) -> Self {
        self.system_message = Some(system_message.into());
        self
    }

    pub fn with_tools(mut self, tools: Vec<ToolDefinition>) -> Self {
        self.tools = tools;
        self
    }

    /// The system override, if it carries any non-whitespace text.
    pub fn system_text(&self) -> Option<&str> {
        self.system_message
            .as_deref()
            .filter(|value| !value.trim().is_empty())
    }

    /// The requested model, or `fallback` when none was requested.
    pub fn model_or(&self, fallback: &str) -> String {
        match self.model.as_deref().map(str::trim) {
            Some(model) if !model.is_empty() => model.to_string(),
            _ => fallback.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ChatCompletionRequest {
    /// Oldest first.
    pub messages: Vec<ChatMessage>,
    pub options: ChatOptions,
}

impl ChatCompletionRequest {
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self {
            messages,
            options: ChatOptions::default(),
        }
    }

    pub fn with_options(mut self, options: ChatOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_message(mut self, message: ChatMessage) -> Self {
        self.messages.push(message);
        self
    }

    pub fn validate(&self, provider: &str) -> Result<(), ProviderError> {
        if self.messages.is_empty() {
            return Err(ProviderError::invalid_request(
                provider,
                "at least one message is required",
            ));
        }

        if let Some(max_tokens) = self.options.max_tokens
            && max_tokens == 0
        {
            return Err(ProviderError::invalid_request(
                provider,
                "max_tokens must be greater than zero",
            ));
        }

        if let Some(temperature) = self.options.temperature
            && !(0.0..=2.0).contains(&temperature)
        {
            return Err(ProviderError::invalid_request(
                provider,
                "temperature must be in the inclusive range 0.0..=2.0",
            ));
        }

        if let Some(top_probability) = self.options.top_probability
            && !(0.0..=1.0).contains(&top_probability)
        {
            return Err(ProviderError::invalid_request(
                provider,
                "top_probability must be in the inclusive range 0.0..=1.0",
            ));
        }

        if self.options.top_k_tokens == Some(0) {
            return Err(ProviderError::invalid_request(
                provider,
                "top_k_tokens must be greater than zero",
            ));
        }

        Ok(())
    }
}

/// Terminal reason normalized across backends.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FinishReason {
    Stop,
    Length,
    ToolCalls,
    ContentFilter,
    Other(String),
}

impl FinishReason {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Stop => "stop",
            Self::Length => "length",
            Self::ToolCalls => "tool_calls",
            Self::ContentFilter => "content_filter",
            Self::Other(value) => value,
        }
    }
}

impl Display for FinishReason {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for FinishReason {
    fn from(value: String) -> Self {
        match value.as_str() {
            "stop" => Self::Stop,
            "length" => Self::Length,
            "tool_calls" => Self::ToolCalls,
            "content_filter" => Self::ContentFilter,
            _ => Self::Other(value),
        }
    }
}

impl From<FinishReason> for String {
    fn from(value: FinishReason) -> Self {
        value.as_str().to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

impl Usage {
    pub fn new(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens.saturating_add(completion_tokens),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatCompletionResponse {
    pub model: String,
    pub text: String,
    pub finish_reason: FinishReason,
    pub usage: Usage,
    pub tool_calls: Vec<ToolCall>,
    pub output_variables: BTreeMap<String, String>,
}

impl ChatCompletionResponse {
    /// Assembles a response and extracts its tagged output variables.
    pub fn new(
        model: impl Into<String>,
        text: impl Into<String>,
        finish_reason: FinishReason,
        usage: Usage,
        tool_calls: Vec<ToolCall>,
    ) -> Self {
        let text = text.into();
        let output_variables = extract_output_variables(&text);

        Self {
            model: model.into(),
            text,
            finish_reason,
            usage,
            tool_calls,
            output_variables,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamChunk {
    pub model: String,
    pub text: Option<String>,
    pub finish_reason: Option<FinishReason>,
}

impl StreamChunk {
    pub fn delta(model: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            text: Some(text.into()),
            finish_reason: None,
        }
    }

    pub fn terminal(model: impl Into<String>, finish_reason: FinishReason) -> Self {
        Self {
            model: model.into(),
            text: None,
            finish_reason: Some(finish_reason),
        }
    }

    pub fn is_final(&self) -> bool {
        self.finish_reason.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Model {
    pub id: String,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Model {
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            created: None,
            description: None,
        }
    }

    pub fn with_created(mut self, created: DateTime<Utc>) -> Self {
        self.created = Some(created);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmbeddingInput {
    Text(String),
    Batch(Vec<String>),
}

impl EmbeddingInput {
    pub fn into_texts(self) -> Vec<String> {
        match self {
            Self::Text(text) => vec![text],
            Self::Batch(texts) => texts,
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Self::Text(text) => text.is_empty(),
            Self::Batch(texts) => texts.is_empty(),
        }
    }
}

impl From<&str> for EmbeddingInput {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for EmbeddingInput {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<Vec<String>> for EmbeddingInput {
    fn from(value: Vec<String>) -> Self {
        Self::Batch(value)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingResponse {
    /// First vector of `embeddings`.
    pub embedding: Vec<f32>,
    pub embeddings: Vec<Vec<f32>>,
}

impl EmbeddingResponse {
    pub fn from_vectors(provider: &str, embeddings: Vec<Vec<f32>>) -> Result<Self, ProviderError> {
        let embedding = embeddings.first().cloned().ok_or_else(|| {
            ProviderError::invalid_request(provider, "backend returned zero embeddings")
        })?;

        Ok(Self {
            embedding,
            embeddings,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_enforces_sampling_ranges() {
        let base = ChatCompletionRequest::new(vec![ChatMessage::user("hi")]);
        assert!(base.validate("openai").is_ok());

        let cases = [
            ChatOptions::default().with_max_tokens(0),
            ChatOptions::default().with_temperature(2.5),
            ChatOptions::default().with_top_probability(1.5),
            ChatOptions::default().with_top_k_tokens(0),
        ];

        for options in cases {
            let error = base
                .clone()
                .with_options(options)
                .validate("openai")
                .expect_err("out of range option must fail");
            assert!(error.is_invalid_request());
            assert_eq!(error.provider, "openai");
        }
    }

    #[test]
    fn chat_message_serializes_with_tagged_content() {
        let message = ChatMessage::user("Hi").with_provider("openai");
        let value = serde_json::to_value(&message).expect("message should serialize");

        assert_eq!(value["role"], "user");
        assert_eq!(value["content"]["type"], "text");
        assert_eq!(value["content"]["text"], "Hi");
        assert_eq!(value["providerId"], "openai");
        assert!(value.get("options").is_none());
    }

    #[test]
    fn tool_call_mints_id_when_missing() {
        let reported = ToolCall::function(Some("call_9".to_string()), "lookup", "{}");
        assert_eq!(reported.id, "call_9");

        let minted = ToolCall::function(Some("  ".to_string()), "lookup", "{}");
        assert!(minted.id.starts_with("call_"));
        assert_ne!(minted.id, "call_9");

        let value = serde_json::to_value(&minted).expect("tool call should serialize");
        assert_eq!(value["type"], "function");
        assert_eq!(value["function"]["name"], "lookup");
    }

    #[test]
    fn finish_reason_round_trips_through_strings() {
        assert_eq!(FinishReason::from("length".to_string()), FinishReason::Length);
        assert_eq!(
            FinishReason::from("SAFETY".to_string()),
            FinishReason::Other("SAFETY".to_string())
        );
        assert_eq!(String::from(FinishReason::ToolCalls), "tool_calls");
    }

    #[test]
    fn options_resolve_model_and_system_text() {
        let options = ChatOptions::default().with_system_message("   ");
        assert_eq!(options.system_text(), None);
        assert_eq!(options.model_or("gpt-4o-mini"), "gpt-4o-mini");

        let options = options.with_model("gpt-4o").with_system_message("be terse");
        assert_eq!(options.system_text(), Some("be terse"));
        assert_eq!(options.model_or("gpt-4o-mini"), "gpt-4o");
    }

    #[test]
    fn embedding_response_rejects_empty_results() {
        let error = EmbeddingResponse::from_vectors("openai", Vec::new())
            .expect_err("zero embeddings must fail");
        assert!(error.is_invalid_request());

        let response = EmbeddingResponse::from_vectors("openai", vec![vec![0.1, 0.2], vec![0.3]])
            .expect("vectors should map");
        assert_eq!(response.embedding, vec![0.1, 0.2]);
        assert_eq!(response.embeddings.len(), 2);
    }
}
