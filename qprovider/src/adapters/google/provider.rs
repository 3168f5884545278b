//! Gemini provider. Streaming is emulated over a single `generateContent` call.

use std::sync::Arc;
use std::time::Duration;

use crate::{
    ChatCompletionRequest, ChatCompletionResponse, ChatProvider, ChunkStream, CredentialStore,
    DEFAULT_STREAM_PACING, EmbeddingInput, EmbeddingProvider, EmbeddingResponse, Model,
    ModelCatalog, ModelCatalogCache, ProviderError, ProviderFuture, ProviderIdentity, Role,
    SecretString, emulate_stream, within_deadline,
};

use super::GOOGLE_PROVIDER;
use super::transport::GoogleTransport;
use super::types::{
    GoogleContent, GoogleFunctionDeclaration, GoogleGenerationConfig, GoogleRequest,
    GoogleToolSet,
};

pub const DEFAULT_GOOGLE_MODEL: &str = "gemini-2.0-flash";
pub const DEFAULT_GOOGLE_EMBEDDING_MODEL: &str = "text-embedding-004";

pub fn default_google_models() -> Vec<Model> {
    [
        ("gemini-2.5-pro", "Gemini 2.5 Pro"),
        ("gemini-2.5-flash", "Gemini 2.5 Flash"),
        ("gemini-2.0-flash", "Gemini 2.0 Flash"),
        ("gemini-1.5-pro", "Gemini 1.5 Pro"),
        ("gemini-1.5-flash", "Gemini 1.5 Flash"),
    ]
    .into_iter()
    .map(|(id, label)| Model::new(id, label))
    .collect()
}

#[derive(Clone)]
pub struct GoogleProvider {
    transport: Arc<dyn GoogleTransport>,
    api_key: SecretString,
    default_model: String,
    embedding_model: String,
    stream_pacing: Duration,
    deadline: Option<Duration>,
    catalog: ModelCatalogCache,
}

impl std::fmt::Debug for GoogleProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GoogleProvider")
            .field("transport", &self.transport)
            .field("api_key", &self.api_key)
            .field("default_model", &self.default_model)
            .field("stream_pacing", &self.stream_pacing)
            .field("deadline", &self.deadline)
            .finish()
    }
}

impl GoogleProvider {
    pub fn new(
        credentials: &CredentialStore,
        transport: Arc<dyn GoogleTransport>,
    ) -> Result<Self, ProviderError> {
        let api_key = credentials.require_api_key(GOOGLE_PROVIDER)?;
        let provider = Self {
            transport,
            api_key,
            default_model: DEFAULT_GOOGLE_MODEL.to_string(),
            embedding_model: DEFAULT_GOOGLE_EMBEDDING_MODEL.to_string(),
            stream_pacing: DEFAULT_STREAM_PACING,
            deadline: None,
            catalog: ModelCatalogCache::new(GOOGLE_PROVIDER, default_google_models()),
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

    pub fn with_embedding_model(mut self, model: impl Into<String>) -> Self {
        self.embedding_model = model.into();
        self
    }

    /// Delay between emulated stream chunks; zero only yields to the scheduler.
    pub fn with_stream_pacing(mut self, pacing: Duration) -> Self {
        self.stream_pacing = pacing;
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

    /// Returns the model id and the request body; system text goes to `systemInstruction`.
    pub(crate) fn build_request(&self, request: &ChatCompletionRequest) -> (String, GoogleRequest) {
        let options = &request.options;
        let mut system_parts = Vec::new();
        if let Some(system) = options.system_text() {
            system_parts.push(system.to_string());
        }

        let mut contents = Vec::with_capacity(request.messages.len());
        for message in &request.messages {
            match message.role {
                Role::System => system_parts.push(message.text().to_string()),
                Role::User => contents.push(GoogleContent::text(Some("user"), message.text())),
                Role::Assistant => {
                    contents.push(GoogleContent::text(Some("model"), message.text()))
                }
            }
        }

        let system_instruction = if system_parts.is_empty() {
            None
        } else {
            Some(GoogleContent::text(None, system_parts.join("\n\n")))
        };

        let generation_config = GoogleGenerationConfig {
            max_output_tokens: options.max_tokens,
            temperature: options.temperature,
            top_p: options.top_probability,
            top_k: options.top_k_tokens,
        };

        let tools = if options.tools.is_empty() {
            Vec::new()
        } else {
            vec![GoogleToolSet {
                function_declarations: options
                    .tools
                    .iter()
                    .map(|tool| GoogleFunctionDeclaration {
                        name: tool.name.clone(),
                        description: tool.description.clone(),
                        parameters: tool.parameters.clone(),
                    })
                    .collect(),
            }]
        };

        let body = GoogleRequest {
            contents,
            system_instruction,
            generation_config: (!generation_config.is_empty()).then_some(generation_config),
            tools,
        };

        (options.model_or(&self.default_model), body)
    }

    async fn generate(
        &self,
        request: ChatCompletionRequest,
        stream: bool,
    ) -> Result<ChatCompletionResponse, ProviderError> {
        request.validate(GOOGLE_PROVIDER)?;
        let (model, body) = self.build_request(&request);
        tracing::debug!(
            phase = "provider",
            event = "request_started",
            provider = GOOGLE_PROVIDER,
            model = %model,
            stream,
        );

        let response = within_deadline(
            GOOGLE_PROVIDER,
            self.deadline,
            self.transport
                .generate_content(model.clone(), body, self.api_key.clone()),
        )
        .await
        .inspect_err(|error| {
            tracing::warn!(
                phase = "provider",
                event = "request_failed",
                provider = GOOGLE_PROVIDER,
                kind = %error.kind,
                error = %error.message,
            );
        })?;

        Ok(response.into_chat_response(&model))
    }
}

impl ProviderIdentity for GoogleProvider {
    fn name(&self) -> &str {
        GOOGLE_PROVIDER
    }
}

impl ChatProvider for GoogleProvider {
    fn generate_chat_completion<'a>(
        &'a self,
        request: ChatCompletionRequest,
    ) -> ProviderFuture<'a, Result<ChatCompletionResponse, ProviderError>> {
        Box::pin(self.generate(request, false))
    }

    fn stream_chat_completion<'a>(
        &'a self,
        request: ChatCompletionRequest,
    ) -> ProviderFuture<'a, Result<ChunkStream<'a>, ProviderError>> {
        Box::pin(async move {
            let response = self.generate(request, true).await?;
            Ok(emulate_stream(response, self.stream_pacing))
        })
    }
}

impl ModelCatalog for GoogleProvider {
    fn list_models<'a>(&'a self) -> ProviderFuture<'a, Result<Vec<Model>, ProviderError>> {
        Box::pin(async move { Ok(self.catalog.snapshot()) })
    }
}

impl EmbeddingProvider for GoogleProvider {
    fn generate_embedding<'a>(
        &'a self,
        input: EmbeddingInput,
        model: Option<String>,
    ) -> ProviderFuture<'a, Result<EmbeddingResponse, ProviderError>> {
        Box::pin(async move {
            if input.is_empty() {
                return Err(ProviderError::invalid_request(
                    GOOGLE_PROVIDER,
                    "embedding input must not be empty",
                ));
            }

            let model = model.unwrap_or_else(|| self.embedding_model.clone());
            let vectors = within_deadline(
                GOOGLE_PROVIDER,
                self.deadline,
                self.transport
                    .embed_contents(model, input.into_texts(), self.api_key.clone()),
            )
            .await?;

            EmbeddingResponse::from_vectors(GOOGLE_PROVIDER, vectors)
        })
    }
}
