//! Ollama provider implemented over the OpenAI-compatible transport.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;

use crate::adapters::http::{classify_send_error, decode_error};
use crate::adapters::openai::{
    OpenAiAuth, OpenAiEmbeddingRequest, OpenAiHttpTransport, OpenAiTransport, map_chunk_stream,
    shape_request,
};
use crate::{
    ChatCompletionRequest, ChatCompletionResponse, ChatProvider, ChunkStream, EmbeddingInput,
    EmbeddingProvider, EmbeddingResponse, Model, ModelCatalog, ModelCatalogCache, ProviderError,
    ProviderFuture, ProviderIdentity, within_deadline,
};

pub const OLLAMA_PROVIDER: &str = "ollama";
pub const OLLAMA_BASE_URL: &str = "http://localhost:11434/v1";
pub const OLLAMA_HOST_URL: &str = "http://localhost:11434";
pub const DEFAULT_OLLAMA_MODEL: &str = "llama3.2";
pub const DEFAULT_OLLAMA_EMBEDDING_MODEL: &str = "nomic-embed-text";

pub fn default_ollama_models() -> Vec<Model> {
    vec![Model::new(DEFAULT_OLLAMA_MODEL, "Llama 3.2")]
}

/// Where the local model list is read from.
#[derive(Debug, Clone)]
enum OllamaCatalogSource {
    /// `GET <host>/api/tags`.
    Tags { client: Client, host_url: String },
    /// The OpenAI-compatible `/models` listing on the transport.
    Transport,
}

#[derive(Clone)]
pub struct OllamaProvider {
    transport: Arc<dyn OpenAiTransport>,
    catalog_source: OllamaCatalogSource,
    default_model: String,
    embedding_model: String,
    deadline: Option<Duration>,
    catalog: ModelCatalogCache,
}

impl std::fmt::Debug for OllamaProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OllamaProvider")
            .field("transport", &self.transport)
            .field("catalog_source", &self.catalog_source)
            .field("default_model", &self.default_model)
            .field("deadline", &self.deadline)
            .finish()
    }
}

impl OllamaProvider {
    /// Needs no credential; the catalog is listed through the transport.
    pub fn new(transport: Arc<dyn OpenAiTransport>) -> Self {
        Self::with_catalog_source(transport, OllamaCatalogSource::Transport)
    }

    /// HTTP provider for a local server, e.g. [`OLLAMA_HOST_URL`], listing models from `/api/tags`.
    pub fn from_host(client: Client, host_url: impl Into<String>) -> Self {
        let host_url = host_url.into();
        let transport = Self::default_http_transport(client.clone())
            .with_base_url(format!("{}/v1", host_url.trim_end_matches('/')));

        Self::with_catalog_source(
            Arc::new(transport),
            OllamaCatalogSource::Tags { client, host_url },
        )
    }

    fn with_catalog_source(
        transport: Arc<dyn OpenAiTransport>,
        catalog_source: OllamaCatalogSource,
    ) -> Self {
        let provider = Self {
            transport,
            catalog_source,
            default_model: DEFAULT_OLLAMA_MODEL.to_string(),
            embedding_model: DEFAULT_OLLAMA_EMBEDDING_MODEL.to_string(),
            deadline: None,
            catalog: ModelCatalogCache::new(OLLAMA_PROVIDER, default_ollama_models()),
        };

        let transport = Arc::clone(&provider.transport);
        let source = provider.catalog_source.clone();
        provider
            .catalog
            .refresh_in_background(async move { fetch_models(transport.as_ref(), &source).await });

        provider
    }

    pub fn default_http_transport(client: Client) -> OpenAiHttpTransport {
        OpenAiHttpTransport::new(client)
            .with_base_url(OLLAMA_BASE_URL)
            .with_provider_name(OLLAMA_PROVIDER)
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

    pub async fn refresh_models(&self) -> Result<Vec<Model>, ProviderError> {
        self.catalog
            .refresh(fetch_models(self.transport.as_ref(), &self.catalog_source))
            .await
    }
}

async fn fetch_models(
    transport: &dyn OpenAiTransport,
    source: &OllamaCatalogSource,
) -> Result<Vec<Model>, ProviderError> {
    match source {
        OllamaCatalogSource::Tags { client, host_url } => {
            let names = list_ollama_models(client, host_url).await?;
            Ok(names
                .into_iter()
                .map(|name| Model::new(name.clone(), name))
                .collect())
        }
        OllamaCatalogSource::Transport => {
            let models = transport.list_models(OpenAiAuth::Anonymous).await?;
            Ok(models.into_iter().map(Model::from).collect())
        }
    }
}

/// Lists locally pulled model names from `<host_url>/api/tags`, sorted.
pub async fn list_ollama_models(client: &Client, host_url: &str) -> Result<Vec<String>, ProviderError> {
    let endpoint = format!("{}/api/tags", host_url.trim_end_matches('/'));

    let response = client
        .get(endpoint)
        .send()
        .await
        .map_err(|err| classify_send_error(OLLAMA_PROVIDER, err))?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        return Err(ProviderError::from_status(
            OLLAMA_PROVIDER,
            status.as_u16(),
            format!("http {status}: {}", qcommon::truncate(&body, 4096)),
        ));
    }

    let parsed = response
        .json::<OllamaTagsResponse>()
        .await
        .map_err(|err| decode_error(OLLAMA_PROVIDER, err))?;

    let mut names = parsed
        .models
        .into_iter()
        .map(|model| model.name)
        .collect::<Vec<_>>();
    names.sort();
    Ok(names)
}

impl ProviderIdentity for OllamaProvider {
    fn name(&self) -> &str {
        OLLAMA_PROVIDER
    }
}

impl ChatProvider for OllamaProvider {
    fn generate_chat_completion<'a>(
        &'a self,
        request: ChatCompletionRequest,
    ) -> ProviderFuture<'a, Result<ChatCompletionResponse, ProviderError>> {
        Box::pin(async move {
            request.validate(OLLAMA_PROVIDER)?;
            let ollama_request = shape_request(&request, &self.default_model, false);
            let model = ollama_request.model.clone();
            tracing::debug!(
                phase = "provider",
                event = "request_started",
                provider = OLLAMA_PROVIDER,
                model = %model,
                stream = false,
            );

            let response = within_deadline(
                OLLAMA_PROVIDER,
                self.deadline,
                self.transport.complete(ollama_request, OpenAiAuth::Anonymous),
            )
            .await?;

            Ok(response.into_chat_response(&model))
        })
    }

    fn stream_chat_completion<'a>(
        &'a self,
        request: ChatCompletionRequest,
    ) -> ProviderFuture<'a, Result<ChunkStream<'a>, ProviderError>> {
        Box::pin(async move {
            request.validate(OLLAMA_PROVIDER)?;
            let ollama_request = shape_request(&request, &self.default_model, true);
            let model = ollama_request.model.clone();

            let chunks = within_deadline(
                OLLAMA_PROVIDER,
                self.deadline,
                self.transport.stream(ollama_request, OpenAiAuth::Anonymous),
            )
            .await?;

            Ok(map_chunk_stream(model, chunks))
        })
    }
}

impl ModelCatalog for OllamaProvider {
    fn list_models<'a>(&'a self) -> ProviderFuture<'a, Result<Vec<Model>, ProviderError>> {
        Box::pin(async move { Ok(self.catalog.snapshot()) })
    }
}

impl EmbeddingProvider for OllamaProvider {
    fn generate_embedding<'a>(
        &'a self,
        input: EmbeddingInput,
        model: Option<String>,
    ) -> ProviderFuture<'a, Result<EmbeddingResponse, ProviderError>> {
        Box::pin(async move {
            if input.is_empty() {
                return Err(ProviderError::invalid_request(
                    OLLAMA_PROVIDER,
                    "embedding input must not be empty",
                ));
            }

            let request = OpenAiEmbeddingRequest {
                model: model.unwrap_or_else(|| self.embedding_model.clone()),
                input: input.into_texts(),
            };

            let vectors = within_deadline(
                OLLAMA_PROVIDER,
                self.deadline,
                self.transport.embed(request, OpenAiAuth::Anonymous),
            )
            .await?;

            EmbeddingResponse::from_vectors(OLLAMA_PROVIDER, vectors)
        })
    }
}

#[derive(Debug, Deserialize)]
struct OllamaTagsResponse {
    #[serde(default)]
    models: Vec<OllamaModelTag>,
}

#[derive(Debug, Deserialize)]
struct OllamaModelTag {
    name: String,
}
