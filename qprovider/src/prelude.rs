//! Common `qprovider` imports for downstream crates.

pub use crate::{
    ChatCompletionRequest, ChatCompletionResponse, ChatMessage, ChatOptions, ChatProvider,
    ChunkStream, CredentialStore, EmbeddingInput, EmbeddingProvider, EmbeddingResponse,
    FinishReason, LlmProvider, MessageContent, Model, ModelCatalog, ProviderError,
    ProviderErrorKind, ProviderIdentity, Providers, RegistryError, Role, StreamChunk, ToolCall,
    ToolDefinition, Usage, collect_stream,
};
pub use qcommon::BoxFuture;
