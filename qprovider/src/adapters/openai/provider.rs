//! OpenAI provider implementation over transport and shared models.

use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;

use crate::{
    ChatCompletionRequest, ChatCompletionResponse, ChatProvider, ChunkStream, CredentialStore,
    EmbeddingInput, EmbeddingProvider, EmbeddingResponse, Model, ModelCatalog, ModelCatalogCache,
    ProviderError, ProviderFuture, ProviderIdentity, until_final, within_deadline,
};

use super::auth::resolve_openai_auth;
use super::transport::{OpenAiChunkStream, OpenAiTransport};
use super::types::{
    OpenAiAuth, OpenAiEmbeddingRequest, OpenAiMessage, OpenAiRequest, OpenAiRole,
    OpenAiStreamChunk, OpenAiTool,
};

pub const OPENAI_PROVIDER: &str = "openai";
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_OPENAI_EMBEDDING_MODEL: &str = "text-embedding-3-small";

pub fn default_openai_models() -> Vec<Model> {
    [
        ("gpt-4o", "GPT-4o"),
        ("gpt-4o-mini", "GPT-4o mini"),
        ("gpt-4.1", "GPT-4.1"),
        ("gpt-4.1-mini", "GPT-4.1 mini"),
        ("o3-mini", "o3-mini"),
    ]
    .into_iter()
    .map(|(id, label)| Model::new(id, label))
    .collect()
}

#[derive(Clone)]
pub struct OpenAiProvider {
    transport: Arc<dyn OpenAiTransport>,
    auth: OpenAiAuth,
    default_model: String,
    embedding_model: String,
    deadline: Option<Duration>,
    catalog: ModelCatalogCache,
}

impl std::fmt::Debug for OpenAiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiProvider")
            .field("transport", &self.transport)
            .field("auth", &self.auth)
            .field("default_model", &self.default_model)
            .field("deadline", &self.deadline)
            .finish()
    }
}

impl OpenAiProvider {
    /// Resolves the API key and starts a background catalog refresh.
    pub fn new(
        credentials: &CredentialStore,
        transport: Arc<dyn OpenAiTransport>,
    ) -> Result<Self, ProviderError> {
        let auth = resolve_openai_auth(credentials)?;
        let provider = Self {
            transport,
            auth,
            default_model: DEFAULT_OPENAI_MODEL.to_string(),
            embedding_model: DEFAULT_OPENAI_EMBEDDING_MODEL.to_string(),
            deadline: None,
            catalog: ModelCatalogCache::new(OPENAI_PROVIDER, default_openai_models()),
        };

        let transport = Arc::clone(&provider.transport);
        let auth = provider.auth.clone();
        provider
            .catalog
            .refresh_in_background(async move { fetch_models(transport.as_ref(), auth).await });

        Ok(provider)
    }

    pub fn with_default_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = model.into();
        self
    }

    pub fn with_embedding_model(mut self, model: impl Into<String>) -> Self {
        self.embedding_model = model.into();
        self
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Fetches the live catalog now, replacing the cached list on success.
    pub async fn refresh_models(&self) -> Result<Vec<Model>, ProviderError> {
        self.catalog
            .refresh(fetch_models(self.transport.as_ref(), self.auth.clone()))
            .await
    }

    pub(crate) fn build_openai_request(
        &self,
        request: &ChatCompletionRequest,
        stream: bool,
    ) -> OpenAiRequest {
        shape_request(request, &self.default_model, stream)
    }
}

async fn fetch_models(
    transport: &dyn OpenAiTransport,
    auth: OpenAiAuth,
) -> Result<Vec<Model>, ProviderError> {
    let models = transport.list_models(auth).await?;
    Ok(models.into_iter().map(Model::from).collect())
}

/// Shapes a provider-agnostic request for OpenAI-compatible chat endpoints.
///
/// The system override becomes a leading `system` message. Top-k has no equivalent
/// on these endpoints and is not sent.
pub(crate) fn shape_request(
    request: &ChatCompletionRequest,
    default_model: &str,
    stream: bool,
) -> OpenAiRequest {
    let options = &request.options;
    let mut messages = Vec::with_capacity(request.messages.len() + 1);

    if let Some(system) = options.system_text() {
        messages.push(OpenAiMessage::new(OpenAiRole::System, system));
    }
    messages.extend(request.messages.iter().map(OpenAiMessage::from));

    OpenAiRequest {
        model: options.model_or(default_model),
        messages,
        tools: options.tools.iter().map(OpenAiTool::from).collect(),
        temperature: options.temperature,
        top_p: options.top_probability,
        max_tokens: options.max_tokens,
        stream,
    }
}

pub(crate) fn map_chunk_stream<'a>(model: String, chunks: OpenAiChunkStream<'a>) -> ChunkStream<'a> {
    until_final(
        model,
        chunks.map(|chunk| chunk.map(OpenAiStreamChunk::into_stream_chunk)),
    )
}

impl ProviderIdentity for OpenAiProvider {
    fn name(&self) -> &str {
        OPENAI_PROVIDER
    }
}

impl ChatProvider for OpenAiProvider {
    fn generate_chat_completion<'a>(
        &'a self,
        request: ChatCompletionRequest,
    ) -> ProviderFuture<'a, Result<ChatCompletionResponse, ProviderError>> {
        Box::pin(async move {
            request.validate(OPENAI_PROVIDER)?;
            let openai_request = self.build_openai_request(&request, false);
            let model = openai_request.model.clone();
            tracing::debug!(
                phase = "provider",
                event = "request_started",
                provider = OPENAI_PROVIDER,
                model = %model,
                stream = false,
            );

            let result = within_deadline(
                OPENAI_PROVIDER,
                self.deadline,
                self.transport.complete(openai_request, self.auth.clone()),
            )
            .await;

            match result {
                Ok(response) => Ok(response.into_chat_response(&model)),
                Err(error) => {
                    tracing::warn!(
                        phase = "provider",
                        event = "request_failed",
                        provider = OPENAI_PROVIDER,
                        kind = %error.kind,
                        error = %error.message,
                    );
                    Err(error)
                }
            }
        })
    }

    fn stream_chat_completion<'a>(
        &'a self,
        request: ChatCompletionRequest,
    ) -> ProviderFuture<'a, Result<ChunkStream<'a>, ProviderError>> {
        Box::pin(async move {
            request.validate(OPENAI_PROVIDER)?;
            let openai_request = self.build_openai_request(&request, true);
            let model = openai_request.model.clone();
            tracing::debug!(
                phase = "provider",
                event = "request_started",
                provider = OPENAI_PROVIDER,
                model = %model,
                stream = true,
            );

            let chunks = within_deadline(
                OPENAI_PROVIDER,
                self.deadline,
                self.transport.stream(openai_request, self.auth.clone()),
            )
            .await
            .inspect_err(|error| {
                tracing::warn!(
                    phase = "provider",
                    event = "stream_failed",
                    provider = OPENAI_PROVIDER,
                    kind = %error.kind,
                    error = %error.message,
                );
            })?;

            Ok(map_chunk_stream(model, chunks))
        })
    }
}

impl ModelCatalog for OpenAiProvider {
    fn list_models<'a>(&'a self) -> ProviderFuture<'a, Result<Vec<Model>, ProviderError>> {
        Box::pin(async move { Ok(self.catalog.snapshot()) })
    }
}

impl EmbeddingProvider for OpenAiProvider {
    fn generate_embedding<'a>(
        &'a self,
        input: EmbeddingInput,
        model: Option<String>,
    ) -> ProviderFuture<'a, Result<EmbeddingResponse, ProviderError>> {
        Box::pin(async move {
            if input.is_empty() {
                return Err(ProviderError::invalid_request(
                    OPENAI_PROVIDER,
                    "embedding input must not be empty",
                ));
            }

            let request = OpenAiEmbeddingRequest {
                model: model.unwrap_or_else(|| self.embedding_model.clone()),
                input: input.into_texts(),
            };

            let vectors = within_deadline(
                OPENAI_PROVIDER,
                self.deadline,
                self.transport.embed(request, self.auth.clone()),
            )
            .await?;

            EmbeddingResponse::from_vectors(OPENAI_PROVIDER, vectors)
        })
    }
}
