//! Anthropic provider over the Messages API.

use std::sync::Arc;
use std::time::Duration;

use async_stream::try_stream;
use futures_util::StreamExt;

use crate::adapters::http::classify_error;
use crate::{
    ChatCompletionRequest, ChatCompletionResponse, ChatProvider, ChunkStream, CredentialStore,
    Model, ModelCatalog, ModelCatalogCache, ProviderError, ProviderFuture, ProviderIdentity,
    Role, SecretString, StreamChunk, until_final, within_deadline,
};

use super::ANTHROPIC_PROVIDER;
use super::transport::{AnthropicEventStream, AnthropicTransport};
use super::types::{
    AnthropicDelta, AnthropicMessage, AnthropicRequest, AnthropicStreamEvent, AnthropicTool,
    parse_stop_reason,
};

pub const DEFAULT_ANTHROPIC_MODEL: &str = "claude-3-5-sonnet-latest";
/// The Messages API requires an explicit output limit.
pub const DEFAULT_ANTHROPIC_MAX_TOKENS: u32 = 1024;

pub fn default_anthropic_models() -> Vec<Model> {
    [
        ("claude-sonnet-4-0", "Claude Sonnet 4"),
        ("claude-opus-4-0", "Claude Opus 4"),
        ("claude-3-7-sonnet-latest", "Claude Sonnet 3.7"),
        ("claude-3-5-sonnet-latest", "Claude Sonnet 3.5"),
        ("claude-3-5-haiku-latest", "Claude Haiku 3.5"),
    ]
    .into_iter()
    .map(|(id, label)| Model::new(id, label))
    .collect()
}

#[derive(Clone)]
pub struct AnthropicProvider {
    transport: Arc<dyn AnthropicTransport>,
    api_key: SecretString,
    default_model: String,
    default_max_tokens: u32,
    deadline: Option<Duration>,
    catalog: ModelCatalogCache,
}

impl std::fmt::Debug for AnthropicProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnthropicProvider")
            .field("transport", &self.transport)
            .field("api_key", &self.api_key)
            .field("default_model", &self.default_model)
            .field("deadline", &self.deadline)
            .finish()
    }
}

impl AnthropicProvider {
    pub fn new(
        credentials: &CredentialStore,
        transport: Arc<dyn AnthropicTransport>,
    ) -> Result<Self, ProviderError> {
        let api_key = credentials.require_api_key(ANTHROPIC_PROVIDER)?;
        let provider = Self {
            transport,
            api_key,
            default_model: DEFAULT_ANTHROPIC_MODEL.to_string(),
            default_max_tokens: DEFAULT_ANTHROPIC_MAX_TOKENS,
            deadline: None,
            catalog: ModelCatalogCache::new(ANTHROPIC_PROVIDER, default_anthropic_models()),
        };

        let transport = Arc::clone(&provider.transport);
        let api_key = provider.api_key.clone();
        provider.catalog.refresh_in_background(async move {
            let models = transport.list_models(api_key).await?;
            Ok::<Vec<Model>, ProviderError>(models.into_iter().map(Model::from).collect())
        });

        Ok(provider)
    }

    pub fn with_default_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = model.into();
        self
    }

    pub fn with_default_max_tokens(mut self, max_tokens: u32) -> Self {
        self.default_max_tokens = max_tokens;
        self
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub async fn refresh_models(&self) -> Result<Vec<Model>, ProviderError> {
        let fetch = async {
            let models = self.transport.list_models(self.api_key.clone()).await?;
            Ok::<Vec<Model>, ProviderError>(models.into_iter().map(Model::from).collect())
        };

        self.catalog.refresh(fetch).await
    }

    /// Folds the system override and any `system` turns into the top-level `system` field.
    pub(crate) fn build_request(&self, request: &ChatCompletionRequest, stream: bool) -> AnthropicRequest {
        let options = &request.options;
        let mut system_parts = Vec::new();
        if let Some(system) = options.system_text() {
            system_parts.push(system.to_string());
        }

        let mut messages = Vec::with_capacity(request.messages.len());
        for message in &request.messages {
            match message.role {
                Role::System => system_parts.push(message.text().to_string()),
                Role::User => messages.push(AnthropicMessage {
                    role: "user",
                    content: message.text().to_string(),
                }),
                Role::Assistant => messages.push(AnthropicMessage {
                    role: "assistant",
                    content: message.text().to_string(),
                }),
            }
        }

        let system = if system_parts.is_empty() {
            None
        } else {
            Some(system_parts.join("\n\n"))
        };

        AnthropicRequest {
            model: options.model_or(&self.default_model),
            max_tokens: options.max_tokens.unwrap_or(self.default_max_tokens),
            messages,
            system,
            temperature: options.temperature,
            top_p: options.top_probability,
            top_k: options.top_k_tokens,
            tools: options
                .tools
                .iter()
                .map(|tool| AnthropicTool {
                    name: tool.name.clone(),
                    description: tool.description.clone(),
                    input_schema: tool.parameters.clone(),
                })
                .collect(),
            stream,
        }
    }
}

fn map_event_stream<'a>(fallback_model: String, mut events: AnthropicEventStream<'a>) -> ChunkStream<'a> {
    let mut model = fallback_model.clone();
    let chunks = try_stream! {
        while let Some(event) = events.next().await {
            match event? {
                AnthropicStreamEvent::MessageStart { message } => {
                    if !message.model.is_empty() {
                        model = message.model;
                    }
                }
                AnthropicStreamEvent::ContentBlockDelta {
                    delta: AnthropicDelta::TextDelta { text },
                } => {
                    if !text.is_empty() {
                        yield StreamChunk::delta(model.clone(), text);
                    }
                }
                AnthropicStreamEvent::MessageDelta { delta } => {
                    if let Some(reason) = delta.stop_reason {
                        yield StreamChunk::terminal(model.clone(), parse_stop_reason(Some(&reason)));
                    }
                }
                AnthropicStreamEvent::MessageStop => break,
                AnthropicStreamEvent::Error { error } => {
                    Err::<(), ProviderError>(classify_error(ANTHROPIC_PROVIDER, None, error.into()))?;
                }
                _ => {}
            }
        }
    };

    until_final(fallback_model, chunks)
}

impl ProviderIdentity for AnthropicProvider {
    fn name(&self) -> &str {
        ANTHROPIC_PROVIDER
    }
}

impl ChatProvider for AnthropicProvider {
    fn generate_chat_completion<'a>(
        &'a self,
        request: ChatCompletionRequest,
    ) -> ProviderFuture<'a, Result<ChatCompletionResponse, ProviderError>> {
        Box::pin(async move {
            request.validate(ANTHROPIC_PROVIDER)?;
            let anthropic_request = self.build_request(&request, false);
            let model = anthropic_request.model.clone();
            tracing::debug!(
                phase = "provider",
                event = "request_started",
                provider = ANTHROPIC_PROVIDER,
                model = %model,
                stream = false,
            );

            let response = within_deadline(
                ANTHROPIC_PROVIDER,
                self.deadline,
                self.transport
                    .create_message(anthropic_request, self.api_key.clone()),
            )
            .await
            .inspect_err(|error| {
                tracing::warn!(
                    phase = "provider",
                    event = "request_failed",
                    provider = ANTHROPIC_PROVIDER,
                    kind = %error.kind,
                    error = %error.message,
                );
            })?;

            Ok(response.into_chat_response(&model))
        })
    }

    fn stream_chat_completion<'a>(
        &'a self,
        request: ChatCompletionRequest,
    ) -> ProviderFuture<'a, Result<ChunkStream<'a>, ProviderError>> {
        Box::pin(async move {
            request.validate(ANTHROPIC_PROVIDER)?;
            let anthropic_request = self.build_request(&request, true);
            let model = anthropic_request.model.clone();
            tracing::debug!(
                phase = "provider",
                event = "request_started",
                provider = ANTHROPIC_PROVIDER,
                model = %model,
                stream = true,
            );

            let events = within_deadline(
                ANTHROPIC_PROVIDER,
                self.deadline,
                self.transport
                    .stream_message(anthropic_request, self.api_key.clone()),
            )
            .await
            .inspect_err(|error| {
                tracing::warn!(
                    phase = "provider",
                    event = "stream_failed",
                    provider = ANTHROPIC_PROVIDER,
                    kind = %error.kind,
                    error = %error.message,
                );
            })?;

            Ok(map_event_stream(model, events))
        })
    }
}

impl ModelCatalog for AnthropicProvider {
    fn list_models<'a>(&'a self) -> ProviderFuture<'a, Result<Vec<Model>, ProviderError>> {
        Box::pin(async move { Ok(self.catalog.snapshot()) })
    }
}
