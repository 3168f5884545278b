//! Gemini transport trait and reqwest-based HTTP implementation.

use reqwest::Client;

use crate::adapters::http::{classify_send_error, decode_error, read_error_response};
use crate::{ProviderError, ProviderFuture, SecretString};

use super::GOOGLE_PROVIDER;
use super::types::{
    GoogleBatchEmbedRequest, GoogleBatchEmbedResponse, GoogleContent, GoogleEmbedRequest,
    GoogleEmbedResponse, GoogleModel, GoogleModelList, GoogleRequest, GoogleResponse,
    extract_error_detail,
};

pub const GOOGLE_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

pub trait GoogleTransport: Send + Sync + std::fmt::Debug {
    fn generate_content<'a>(
        &'a self,
        model: String,
        request: GoogleRequest,
        api_key: SecretString,
    ) -> ProviderFuture<'a, Result<GoogleResponse, ProviderError>>;

    /// Embedding vectors in input order.
    fn embed_contents<'a>(
        &'a self,
        model: String,
        texts: Vec<String>,
        api_key: SecretString,
    ) -> ProviderFuture<'a, Result<Vec<Vec<f32>>, ProviderError>>;

    fn list_models<'a>(
        &'a self,
        api_key: SecretString,
    ) -> ProviderFuture<'a, Result<Vec<GoogleModel>, ProviderError>>;
}

#[derive(Debug, Clone)]
pub struct GoogleHttpTransport {
    client: Client,
    base_url: String,
}

impl GoogleHttpTransport {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            base_url: GOOGLE_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn model_endpoint(&self, model: &str, method: &str) -> String {
        let model = model.strip_prefix("models/").unwrap_or(model);
        format!(
            "{}/models/{model}:{method}",
            self.base_url.trim_end_matches('/')
        )
    }

    async fn send(
        &self,
        builder: reqwest::RequestBuilder,
        api_key: &SecretString,
    ) -> Result<reqwest::Response, ProviderError> {
        let response = builder
            .header("x-goog-api-key", api_key.expose())
            .send()
            .await
            .map_err(|err| classify_send_error(GOOGLE_PROVIDER, err))?;

        if !response.status().is_success() {
            return Err(read_error_response(GOOGLE_PROVIDER, response, extract_error_detail).await);
        }

        Ok(response)
    }
}

impl GoogleTransport for GoogleHttpTransport {
    fn generate_content<'a>(
        &'a self,
        model: String,
        request: GoogleRequest,
        api_key: SecretString,
    ) -> ProviderFuture<'a, Result<GoogleResponse, ProviderError>> {
        Box::pin(async move {
            let builder = self
                .client
                .post(self.model_endpoint(&model, "generateContent"))
                .json(&request);
            let response = self.send(builder, &api_key).await?;

            response
                .json::<GoogleResponse>()
                .await
                .map_err(|err| decode_error(GOOGLE_PROVIDER, err))
        })
    }

    fn embed_contents<'a>(
        &'a self,
        model: String,
        texts: Vec<String>,
        api_key: SecretString,
    ) -> ProviderFuture<'a, Result<Vec<Vec<f32>>, ProviderError>> {
        Box::pin(async move {
            let resource = format!("models/{}", model.strip_prefix("models/").unwrap_or(&model));
            let mut requests = texts
                .into_iter()
                .map(|text| GoogleEmbedRequest {
                    model: resource.clone(),
                    content: GoogleContent::text(None, text),
                })
                .collect::<Vec<_>>();

            if requests.len() == 1 {
                let single = requests.remove(0);
                let builder = self
                    .client
                    .post(self.model_endpoint(&model, "embedContent"))
                    .json(&single);
                let response = self.send(builder, &api_key).await?;
                let parsed = response
                    .json::<GoogleEmbedResponse>()
                    .await
                    .map_err(|err| decode_error(GOOGLE_PROVIDER, err))?;

                return Ok(vec![parsed.embedding.values]);
            }

            let builder = self
                .client
                .post(self.model_endpoint(&model, "batchEmbedContents"))
                .json(&GoogleBatchEmbedRequest { requests });
            let response = self.send(builder, &api_key).await?;
            let parsed = response
                .json::<GoogleBatchEmbedResponse>()
                .await
                .map_err(|err| decode_error(GOOGLE_PROVIDER, err))?;

            Ok(parsed
                .embeddings
                .into_iter()
                .map(|embedding| embedding.values)
                .collect())
        })
    }

    fn list_models<'a>(
        &'a self,
        api_key: SecretString,
    ) -> ProviderFuture<'a, Result<Vec<GoogleModel>, ProviderError>> {
        Box::pin(async move {
            let url = format!("{}/models", self.base_url.trim_end_matches('/'));
            let response = self.send(self.client.get(url), &api_key).await?;

            let parsed = response
                .json::<GoogleModelList>()
                .await
                .map_err(|err| decode_error(GOOGLE_PROVIDER, err))?;

            Ok(parsed.models)
        })
    }
}
