mod auth;
mod provider;
mod serde_api;
mod transport;
mod types;

pub use provider::{
    DEFAULT_OPENAI_EMBEDDING_MODEL, DEFAULT_OPENAI_MODEL, OPENAI_PROVIDER, OpenAiProvider,
    default_openai_models,
};
pub use transport::{OPENAI_BASE_URL, OpenAiChunkStream, OpenAiHttpTransport, OpenAiTransport};
pub use types::{
    OpenAiAuth, OpenAiEmbeddingRequest, OpenAiMessage, OpenAiModel, OpenAiRequest, OpenAiResponse,
    OpenAiRole, OpenAiStreamChunk, OpenAiTool, OpenAiToolCall, OpenAiUsage,
};

pub(crate) use provider::{map_chunk_stream, shape_request};
