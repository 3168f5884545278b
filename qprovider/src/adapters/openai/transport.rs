//! OpenAI transport trait and reqwest-based HTTP implementation.

use std::pin::Pin;

use async_stream::try_stream;
use futures_core::Stream;
use futures_util::StreamExt;
use reqwest::Client;

use crate::adapters::http::{
    SseBuffer, classify_error, classify_send_error, decode_error, read_error_response,
};
use crate::{ProviderError, ProviderFuture};

use super::serde_api::{
    OpenAiApiEmbeddingRequest, OpenAiApiEmbeddingResponse, OpenAiApiModelList, OpenAiApiResponse,
    OpenAiApiStreamResponse, build_api_request, extract_error_detail,
};
use super::types::{
    OpenAiAuth, OpenAiEmbeddingRequest, OpenAiModel, OpenAiRequest, OpenAiResponse,
    OpenAiStreamChunk,
};

pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

pub type OpenAiChunkStream<'a> =
    Pin<Box<dyn Stream<Item = Result<OpenAiStreamChunk, ProviderError>> + Send + 'a>>;

pub trait OpenAiTransport: Send + Sync + std::fmt::Debug {
    fn complete<'a>(
        &'a self,
        request: OpenAiRequest,
        auth: OpenAiAuth,
    ) -> ProviderFuture<'a, Result<OpenAiResponse, ProviderError>>;

    fn stream<'a>(
        &'a self,
        request: OpenAiRequest,
        auth: OpenAiAuth,
    ) -> ProviderFuture<'a, Result<OpenAiChunkStream<'a>, ProviderError>>;

    /// Embedding vectors in input order.
    fn embed<'a>(
        &'a self,
        request: OpenAiEmbeddingRequest,
        auth: OpenAiAuth,
    ) -> ProviderFuture<'a, Result<Vec<Vec<f32>>, ProviderError>>;

    fn list_models<'a>(
        &'a self,
        auth: OpenAiAuth,
    ) -> ProviderFuture<'a, Result<Vec<OpenAiModel>, ProviderError>>;
}

#[derive(Debug, Clone)]
pub struct OpenAiHttpTransport {
    client: Client,
    base_url: String,
    provider: String,
}

impl OpenAiHttpTransport {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            base_url: OPENAI_BASE_URL.to_string(),
            provider: "openai".to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Name used to tag errors raised by this transport.
    pub fn with_provider_name(mut self, provider: impl Into<String>) -> Self {
        self.provider = provider.into();
        self
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }

    fn apply_auth(
        &self,
        builder: reqwest::RequestBuilder,
        auth: &OpenAiAuth,
    ) -> reqwest::RequestBuilder {
        match auth {
            OpenAiAuth::ApiKey(key) => builder.bearer_auth(key.expose()),
            OpenAiAuth::Anonymous => builder,
        }
    }

    async fn send(
        &self,
        builder: reqwest::RequestBuilder,
        auth: &OpenAiAuth,
    ) -> Result<reqwest::Response, ProviderError> {
        let response = self
            .apply_auth(builder, auth)
            .send()
            .await
            .map_err(|err| classify_send_error(&self.provider, err))?;

        if !response.status().is_success() {
            return Err(read_error_response(&self.provider, response, extract_error_detail).await);
        }

        Ok(response)
    }
}

impl OpenAiTransport for OpenAiHttpTransport {
    fn complete<'a>(
        &'a self,
        mut request: OpenAiRequest,
        auth: OpenAiAuth,
    ) -> ProviderFuture<'a, Result<OpenAiResponse, ProviderError>> {
        Box::pin(async move {
            request.stream = false;
            let api_request = build_api_request(request);
            let builder = self.client.post(self.endpoint("chat/completions")).json(&api_request);
            let response = self.send(builder, &auth).await?;

            let parsed: OpenAiApiResponse = response
                .json()
                .await
                .map_err(|err| decode_error(&self.provider, err))?;

            parsed.into_response().ok_or_else(|| {
                ProviderError::invalid_request(&self.provider, "response did not include choices")
            })
        })
    }

    fn stream<'a>(
        &'a self,
        mut request: OpenAiRequest,
        auth: OpenAiAuth,
    ) -> ProviderFuture<'a, Result<OpenAiChunkStream<'a>, ProviderError>> {
        Box::pin(async move {
            request.stream = true;
            let fallback_model = request.model.clone();
            let api_request = build_api_request(request);
            let builder = self.client.post(self.endpoint("chat/completions")).json(&api_request);
            let response = self.send(builder, &auth).await?;
            let provider = self.provider.clone();

            let stream = try_stream! {
                let mut bytes = response.bytes_stream();
                let mut buffer = SseBuffer::default();
                let mut done = false;

                while !done {
                    let payload = match buffer.next_data() {
                        Some(payload) => payload,
                        None => match bytes.next().await {
                            Some(item) => {
                                let chunk = item.map_err(|err| classify_send_error(&provider, err))?;
                                buffer.push(&chunk);
                                continue;
                            }
                            None => match buffer.finish() {
                                Some(payload) => {
                                    done = true;
                                    payload
                                }
                                None => break,
                            },
                        },
                    };

                    if payload == "[DONE]" {
                        break;
                    }

                    let parsed: OpenAiApiStreamResponse = serde_json::from_str(&payload)
                        .map_err(|err| decode_error(&provider, err))?;

                    if let Some(error) = parsed.error {
                        Err::<(), ProviderError>(classify_error(&provider, None, error.into()))?;
                    }

                    let model = parsed.model.unwrap_or_else(|| fallback_model.clone());
                    for choice in parsed.choices {
                        if choice.delta.content.is_none() && choice.finish_reason.is_none() {
                            continue;
                        }

                        yield OpenAiStreamChunk {
                            model: model.clone(),
                            delta: choice.delta.content,
                            finish_reason: choice.finish_reason,
                        };
                    }
                }
            };

            Ok(Box::pin(stream) as OpenAiChunkStream<'a>)
        })
    }

    fn embed<'a>(
        &'a self,
        request: OpenAiEmbeddingRequest,
        auth: OpenAiAuth,
    ) -> ProviderFuture<'a, Result<Vec<Vec<f32>>, ProviderError>> {
        Box::pin(async move {
            let api_request = OpenAiApiEmbeddingRequest {
                model: request.model,
                input: request.input,
            };
            let builder = self.client.post(self.endpoint("embeddings")).json(&api_request);
            let response = self.send(builder, &auth).await?;

            let parsed: OpenAiApiEmbeddingResponse = response
                .json()
                .await
                .map_err(|err| decode_error(&self.provider, err))?;

            Ok(parsed.into_vectors())
        })
    }

    fn list_models<'a>(
        &'a self,
        auth: OpenAiAuth,
    ) -> ProviderFuture<'a, Result<Vec<OpenAiModel>, ProviderError>> {
        Box::pin(async move {
            let builder = self.client.get(self.endpoint("models"));
            let response = self.send(builder, &auth).await?;

            let parsed: OpenAiApiModelList = response
                .json()
                .await
                .map_err(|err| decode_error(&self.provider, err))?;

            let mut models = parsed
                .data
                .into_iter()
                .map(OpenAiModel::from)
                .collect::<Vec<_>>();
            models.sort_by(|left, right| left.id.cmp(&right.id));
            Ok(models)
        })
    }
}
