//! Anthropic transport trait and reqwest-based HTTP implementation.

use std::pin::Pin;

use async_stream::try_stream;
use futures_core::Stream;
use futures_util::StreamExt;
use reqwest::Client;

use crate::adapters::http::{SseBuffer, classify_send_error, decode_error, read_error_response};
use crate::{ProviderError, ProviderFuture, SecretString};

use super::ANTHROPIC_PROVIDER;
use super::types::{
    AnthropicModel, AnthropicModelList, AnthropicRequest, AnthropicResponse,
    AnthropicStreamEvent, extract_error_detail,
};

pub const ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com/v1";
pub const ANTHROPIC_VERSION: &str = "2023-06-01";

pub type AnthropicEventStream<'a> =
    Pin<Box<dyn Stream<Item = Result<AnthropicStreamEvent, ProviderError>> + Send + 'a>>;

pub trait AnthropicTransport: Send + Sync + std::fmt::Debug {
    fn create_message<'a>(
        &'a self,
        request: AnthropicRequest,
        api_key: SecretString,
    ) -> ProviderFuture<'a, Result<AnthropicResponse, ProviderError>>;

    fn stream_message<'a>(
        &'a self,
        request: AnthropicRequest,
        api_key: SecretString,
    ) -> ProviderFuture<'a, Result<AnthropicEventStream<'a>, ProviderError>>;

    fn list_models<'a>(
        &'a self,
        api_key: SecretString,
    ) -> ProviderFuture<'a, Result<Vec<AnthropicModel>, ProviderError>>;
}

#[derive(Debug, Clone)]
pub struct AnthropicHttpTransport {
    client: Client,
    base_url: String,
}

impl AnthropicHttpTransport {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            base_url: ANTHROPIC_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }

    async fn send(
        &self,
        builder: reqwest::RequestBuilder,
        api_key: &SecretString,
    ) -> Result<reqwest::Response, ProviderError> {
        let response = builder
            .header("x-api-key", api_key.expose())
            .header("anthropic-version", ANTHROPIC_VERSION)
            .send()
            .await
            .map_err(|err| classify_send_error(ANTHROPIC_PROVIDER, err))?;

        if !response.status().is_success() {
            return Err(
                read_error_response(ANTHROPIC_PROVIDER, response, extract_error_detail).await,
            );
        }

        Ok(response)
    }
}

impl AnthropicTransport for AnthropicHttpTransport {
    fn create_message<'a>(
        &'a self,
        mut request: AnthropicRequest,
        api_key: SecretString,
    ) -> ProviderFuture<'a, Result<AnthropicResponse, ProviderError>> {
        Box::pin(async move {
            request.stream = false;
            let builder = self.client.post(self.endpoint("messages")).json(&request);
            let response = self.send(builder, &api_key).await?;

            response
                .json::<AnthropicResponse>()
                .await
                .map_err(|err| decode_error(ANTHROPIC_PROVIDER, err))
        })
    }

    fn stream_message<'a>(
        &'a self,
        mut request: AnthropicRequest,
        api_key: SecretString,
    ) -> ProviderFuture<'a, Result<AnthropicEventStream<'a>, ProviderError>> {
        Box::pin(async move {
            request.stream = true;
            let builder = self.client.post(self.endpoint("messages")).json(&request);
            let response = self.send(builder, &api_key).await?;

            let stream = try_stream! {
                let mut bytes = response.bytes_stream();
                let mut buffer = SseBuffer::default();
                let mut exhausted = false;

                loop {
                    let payload = match buffer.next_data() {
                        Some(payload) => payload,
                        None if exhausted => break,
                        None => match bytes.next().await {
                            Some(item) => {
                                let chunk = item
                                    .map_err(|err| classify_send_error(ANTHROPIC_PROVIDER, err))?;
                                buffer.push(&chunk);
                                continue;
                            }
                            None => {
                                exhausted = true;
                                match buffer.finish() {
                                    Some(payload) => payload,
                                    None => break,
                                }
                            }
                        },
                    };

                    let event: AnthropicStreamEvent = serde_json::from_str(&payload)
                        .map_err(|err| decode_error(ANTHROPIC_PROVIDER, err))?;
                    let stop = event == AnthropicStreamEvent::MessageStop;
                    yield event;

                    if stop {
                        break;
                    }
                }
            };

            Ok(Box::pin(stream) as AnthropicEventStream<'a>)
        })
    }

    fn list_models<'a>(
        &'a self,
        api_key: SecretString,
    ) -> ProviderFuture<'a, Result<Vec<AnthropicModel>, ProviderError>> {
        Box::pin(async move {
            let builder = self.client.get(self.endpoint("models"));
            let response = self.send(builder, &api_key).await?;

            let parsed = response
                .json::<AnthropicModelList>()
                .await
                .map_err(|err| decode_error(ANTHROPIC_PROVIDER, err))?;

            Ok(parsed.data)
        })
    }
}
