//! Single-dependency facade over the qllm workspace crates.
//!
//! Re-exports the provider contract and conversation store, and adds registry wiring
//! for the HTTP adapters, environment configuration, and [`ConversationChat`], which
//! runs turns of a stored conversation against one provider.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use qllm::prelude::*;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! init_tracing();
//! let providers = build_providers_from_env()?;
//! let store = Arc::new(ConversationStore::new());
//! let conversation = store.create_conversation(NewConversation::new().with_title("Demo"))?;
//!
//! let chat = ConversationChat::from_providers(&providers, "openai", Arc::clone(&store))?;
//! let reply = chat
//!     .send(&conversation.id, "Name three prime numbers.", ChatOptions::default())
//!     .await?;
//! println!("{}", reply.text);
//! # Ok(())
//! # }
//! ```

mod chat;
mod config;
mod logging;
mod macros;
mod providers;

pub mod prelude;
pub mod util;

pub use qcommon;
pub use qconversation;
pub use qprovider;

pub use chat::{ChatChunkStream, ChatError, ChatErrorKind, ChatErrorSource, ConversationChat};
pub use config::{
    ANTHROPIC_BASE_URL_VAR, ConfigError, DEADLINE_VAR, DEFAULT_REQUEST_TIMEOUT,
    GOOGLE_BASE_URL_VAR, OLLAMA_BASE_URL_VAR, OPENAI_BASE_URL_VAR, QllmConfig,
    REQUEST_TIMEOUT_VAR, STREAM_PACING_VAR, load_dotenv,
};
pub use logging::{DEFAULT_LOG_FILTER, init_tracing, init_tracing_with};
pub use providers::{BuildError, build_providers, build_providers_from_env};
pub use qcommon::BoxFuture;
pub use qconversation::{
    Conversation, ConversationAction, ConversationError, ConversationErrorKind, ConversationId,
    ConversationMessage, ConversationMetadata, ConversationPatch, ConversationState,
    ConversationStore, MetadataPatch, NewConversation, NewMessage, ReducerEnvironment,
    SystemEnvironment, Transition, reduce,
};
pub use qprovider::{
    ChatCompletionRequest, ChatCompletionResponse, ChatMessage, ChatOptions, ChatProvider,
    ChunkStream, CredentialStore, EmbeddingInput, EmbeddingProvider, EmbeddingResponse,
    FinishReason, FunctionCall, LlmProvider, MessageContent, Model, ModelCatalog,
    ProviderError, ProviderErrorKind, ProviderFuture, ProviderIdentity, Providers,
    RegistryError, RegistryErrorKind, Role, SecretString, StreamChunk, ToolCall,
    ToolDefinition, Usage, collect_stream, extract_output_variables,
};
pub use util::{
    assistant_message, options_for, parse_provider_name, system_message, user_message,
};

#[cfg(test)]
mod tests {
    use crate::Role;

    #[test]
    fn q_msg_macro_creates_expected_message() {
        let message = crate::q_msg!(user => "hello");
        assert_eq!(message.role, Role::User);
        assert_eq!(message.text(), "hello");
    }

    #[test]
    fn q_messages_macro_builds_message_vector() {
        let messages = crate::q_messages![
            system => "You are concise.",
            user => "Summarize the repo",
        ];

        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::System);
        assert_eq!(messages[1].role, Role::User);
        assert!(crate::q_messages![].is_empty());
    }
}
