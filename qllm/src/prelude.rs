//! Common imports for most qllm applications.

pub use crate::{
    assistant_message, build_providers, build_providers_from_env, init_tracing, load_dotenv,
    options_for, parse_provider_name, system_message, user_message,
};
pub use crate::{q_messages, q_msg};
pub use crate::{
    ChatChunkStream, ChatCompletionRequest, ChatCompletionResponse, ChatError, ChatErrorKind,
    ChatMessage, ChatOptions, Conversation, ConversationAction, ConversationChat,
    ConversationStore, CredentialStore, EmbeddingInput, EmbeddingProvider, FinishReason,
    LlmProvider, NewConversation, NewMessage, ProviderError, ProviderErrorKind, Providers,
    QllmConfig, Role, StreamChunk,
};
pub use futures_util::StreamExt;
