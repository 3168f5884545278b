//! Capability traits implemented by backend adapters.

use std::future::Future;
use std::time::Duration;

use crate::{
    ChatCompletionRequest, ChatCompletionResponse, ChunkStream, EmbeddingInput,
    EmbeddingResponse, Model, ProviderError,
};

pub type ProviderFuture<'a, T> = qcommon::BoxFuture<'a, T>;

/// Stable name used to tag errors and log records.
pub trait ProviderIdentity: Send + Sync {
    fn name(&self) -> &str;
}

pub trait ChatProvider: ProviderIdentity {
    fn generate_chat_completion<'a>(
        &'a self,
        request: ChatCompletionRequest,
    ) -> ProviderFuture<'a, Result<ChatCompletionResponse, ProviderError>>;

    /// Opens a fresh backend request. The stream ends after its first terminal chunk.
    fn stream_chat_completion<'a>(
        &'a self,
        request: ChatCompletionRequest,
    ) -> ProviderFuture<'a, Result<ChunkStream<'a>, ProviderError>>;
}

pub trait ModelCatalog: ProviderIdentity {
    /// Best-effort listing; falls back to the adapter's static defaults.
    fn list_models<'a>(&'a self) -> ProviderFuture<'a, Result<Vec<Model>, ProviderError>>;
}

pub trait EmbeddingProvider: ProviderIdentity {
    fn generate_embedding<'a>(
        &'a self,
        input: EmbeddingInput,
        model: Option<String>,
    ) -> ProviderFuture<'a, Result<EmbeddingResponse, ProviderError>>;
}

/// A chat backend that also exposes its model catalog.
pub trait LlmProvider: ChatProvider + ModelCatalog {}

impl<T> LlmProvider for T where T: ChatProvider + ModelCatalog {}

/// Runs `future` under an optional deadline, classifying expiry as retryable.
pub async fn within_deadline<T, F>(
    provider: &str,
    deadline: Option<Duration>,
    future: F,
) -> Result<T, ProviderError>
where
    F: Future<Output = Result<T, ProviderError>>,
{
    match deadline {
        Some(limit) => match tokio::time::timeout(limit, future).await {
            Ok(result) => result,
            Err(_) => Err(ProviderError::deadline_elapsed(provider, limit.as_millis())),
        },
        None => future.await,
    }
}
