//! Provider abstraction layer: one request/response contract over API-incompatible LLM backends.
//!
//! Adapters live under [`adapters`] and implement the capability traits
//! [`ChatProvider`], [`ModelCatalog`] and [`EmbeddingProvider`]. Instances are resolved by
//! name through a [`Providers`] value built by the caller.
//!
//! ```rust
//! use qprovider::prelude::*;
//! use qprovider::{ProviderFuture, VecChunkStream};
//!
//! struct Echo;
//!
//! impl ProviderIdentity for Echo {
//!     fn name(&self) -> &str {
//!         "echo"
//!     }
//! }
//!
//! impl ChatProvider for Echo {
//!     fn generate_chat_completion<'a>(
//!         &'a self,
//!         request: ChatCompletionRequest,
//!     ) -> ProviderFuture<'a, Result<ChatCompletionResponse, ProviderError>> {
//!         Box::pin(async move {
//!             let text = request.messages.last().map(|m| m.text().to_string()).unwrap_or_default();
//!             Ok(ChatCompletionResponse::new("echo-1", text, FinishReason::Stop, Usage::default(), Vec::new()))
//!         })
//!     }
//!
//!     fn stream_chat_completion<'a>(
//!         &'a self,
//!         _request: ChatCompletionRequest,
//!     ) -> ProviderFuture<'a, Result<ChunkStream<'a>, ProviderError>> {
//!         Box::pin(async { Ok(Box::pin(VecChunkStream::new(Vec::new())) as ChunkStream<'a>) })
//!     }
//! }
//!
//! impl ModelCatalog for Echo {
//!     fn list_models<'a>(&'a self) -> ProviderFuture<'a, Result<Vec<Model>, ProviderError>> {
//!         Box::pin(async { Ok(vec![Model::new("echo-1", "Echo")]) })
//!     }
//! }
//!
//! let mut providers = Providers::new();
//! providers.llm_mut().register("echo", || Ok(Echo));
//! assert!(providers.get_llm_provider("echo").is_ok());
//! assert!(providers.get_llm_provider("Echo").is_err());
//! ```

pub mod adapters;
mod catalog;
mod credentials;
mod error;
mod extract;
mod model;
pub mod prelude;
mod provider;
mod registry;
mod stream;

pub use catalog::ModelCatalogCache;
pub use credentials::{CredentialStore, SecretString, env_vars_for};
pub use error::{ProviderError, ProviderErrorKind};
pub use extract::{RESPONSE_VARIABLE, extract_output_variables};
pub use model::{
    ChatCompletionRequest, ChatCompletionResponse, ChatMessage, ChatOptions, EmbeddingInput,
    EmbeddingResponse, FinishReason, FunctionCall, MessageContent, Model, Role, StreamChunk,
    ToolCall, ToolCallKind, ToolDefinition, Usage,
};
pub use provider::{
    ChatProvider, EmbeddingProvider, LlmProvider, ModelCatalog, ProviderFuture, ProviderIdentity,
    within_deadline,
};
pub use registry::{
    EmbeddingRegistry, LazyRegistry, ProviderRegistry, Providers, RegistryError,
    RegistryErrorKind,
};
pub use stream::{
    ChunkEventStream, ChunkStream, CollectedStream, DEFAULT_STREAM_PACING, VecChunkStream,
    collect_stream, emulate_stream, until_final,
};
