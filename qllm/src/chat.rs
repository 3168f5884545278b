//! Conversation-backed chat turns over a single provider.

use std::error::Error;
use std::fmt::{Display, Formatter};
use std::pin::Pin;
use std::sync::Arc;

use async_stream::try_stream;
use futures_core::Stream;
use futures_util::StreamExt;
use qconversation::{ConversationError, ConversationStore, NewMessage};
use qprovider::{
    ChatCompletionRequest, ChatCompletionResponse, ChatMessage, ChatOptions, LlmProvider,
    ProviderError, Providers, RegistryError, StreamChunk,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatErrorKind {
    InvalidRequest,
    Provider,
    Conversation,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatErrorSource {
    Provider(ProviderError),
    Conversation(ConversationError),
    Registry(RegistryError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatError {
    pub kind: ChatErrorKind,
    pub message: String,
    pub source: Option<ChatErrorSource>,
}

impl ChatError {
    pub fn new(kind: ChatErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(ChatErrorKind::InvalidRequest, message)
    }

    pub fn provider_error(&self) -> Option<&ProviderError> {
        match &self.source {
            Some(ChatErrorSource::Provider(error)) => Some(error),
            Some(ChatErrorSource::Registry(error)) => error.provider_error(),
            _ => None,
        }
    }

    pub fn conversation_error(&self) -> Option<&ConversationError> {
        match &self.source {
            Some(ChatErrorSource::Conversation(error)) => Some(error),
            _ => None,
        }
    }
}

impl Display for ChatError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

impl Error for ChatError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match &self.source {
            Some(ChatErrorSource::Provider(error)) => Some(error),
            Some(ChatErrorSource::Conversation(error)) => Some(error),
            Some(ChatErrorSource::Registry(error)) => Some(error),
            None => None,
        }
    }
}

impl From<ProviderError> for ChatError {
    fn from(value: ProviderError) -> Self {
        Self {
            kind: ChatErrorKind::Provider,
            message: value.to_string(),
            source: Some(ChatErrorSource::Provider(value)),
        }
    }
}

impl From<ConversationError> for ChatError {
    fn from(value: ConversationError) -> Self {
        Self {
            kind: ChatErrorKind::Conversation,
            message: value.to_string(),
            source: Some(ChatErrorSource::Conversation(value)),
        }
    }
}

impl From<RegistryError> for ChatError {
    fn from(value: RegistryError) -> Self {
        Self {
            kind: ChatErrorKind::Provider,
            message: value.to_string(),
            source: Some(ChatErrorSource::Registry(value)),
        }
    }
}

pub type ChatChunkStream<'a> = Pin<Box<dyn Stream<Item = Result<StreamChunk, ChatError>> + Send + 'a>>;

/// Sends turns of a stored conversation to one provider and records both sides.
///
/// Nothing is written when the provider call fails, so a failed turn can be retried
/// without duplicating the user message.
#[derive(Clone)]
pub struct ConversationChat {
    provider_id: String,
    provider: Arc<dyn LlmProvider>,
    store: Arc<ConversationStore>,
}

impl std::fmt::Debug for ConversationChat {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConversationChat")
            .field("provider_id", &self.provider_id)
            .finish_non_exhaustive()
    }
}

impl ConversationChat {
    /// Messages are attributed to `provider.name()`.
    pub fn new(provider: Arc<dyn LlmProvider>, store: Arc<ConversationStore>) -> Self {
        Self {
            provider_id: provider.name().to_string(),
            provider,
            store,
        }
    }

    pub fn from_providers(
        providers: &Providers,
        provider_id: &str,
        store: Arc<ConversationStore>,
    ) -> Result<Self, ChatError> {
        let provider = providers.get_llm_provider(provider_id)?;
        Ok(Self {
            provider_id: provider_id.to_string(),
            provider,
            store,
        })
    }

    pub fn provider_id(&self) -> &str {
        &self.provider_id
    }

    pub fn store(&self) -> &Arc<ConversationStore> {
        &self.store
    }

    pub async fn send(
        &self,
        conversation_id: &str,
        user_input: impl Into<String>,
        options: ChatOptions,
    ) -> Result<ChatCompletionResponse, ChatError> {
        let user_input = user_input.into();
        let request = self.prepare(conversation_id, &user_input, &options)?;

        let response = self.provider.generate_chat_completion(request).await?;
        self.record_turn(conversation_id, user_input, response.text.clone(), options)?;

        Ok(response)
    }

    /// Streams the reply. Both turns are stored just before the terminal chunk is
    /// yielded; a stream dropped or failing earlier stores nothing.
    pub fn stream<'a>(
        &'a self,
        conversation_id: &'a str,
        user_input: impl Into<String>,
        options: ChatOptions,
    ) -> ChatChunkStream<'a> {
        let user_input = user_input.into();

        let chunks = try_stream! {
            let request = self.prepare(conversation_id, &user_input, &options)?;
            let mut source = self
                .provider
                .stream_chat_completion(request)
                .await
                .map_err(ChatError::from)?;
            let mut reply = String::new();

            while let Some(chunk) = source.next().await {
                let chunk = chunk.map_err(ChatError::from)?;
                if let Some(text) = &chunk.text {
                    reply.push_str(text);
                }

                if chunk.is_final() {
                    self.record_turn(
                        conversation_id,
                        user_input.clone(),
                        std::mem::take(&mut reply),
                        options.clone(),
                    )?;
                    yield chunk;
                    break;
                }

                yield chunk;
            }
        };

        Box::pin(chunks)
    }

    fn prepare(
        &self,
        conversation_id: &str,
        user_input: &str,
        options: &ChatOptions,
    ) -> Result<ChatCompletionRequest, ChatError> {
        if user_input.trim().is_empty() {
            return Err(ChatError::invalid_request("user input must not be empty"));
        }

        let conversation = self.store.require(conversation_id)?;
        let mut messages = conversation.chat_messages();
        messages.push(ChatMessage::user(user_input).with_provider(self.provider_id.clone()));

        Ok(ChatCompletionRequest::new(messages).with_options(options.clone()))
    }

    fn record_turn(
        &self,
        conversation_id: &str,
        user_input: String,
        reply: String,
        options: ChatOptions,
    ) -> Result<(), ChatError> {
        self.store.add_message(
            conversation_id,
            NewMessage::user(user_input, self.provider_id.clone()).with_options(options),
        )?;
        self.store.add_message(
            conversation_id,
            NewMessage::assistant(reply, self.provider_id.clone()),
        )?;

        tracing::debug!(
            phase = "chat",
            event = "turn_recorded",
            provider = %self.provider_id,
            conversation = %conversation_id,
        );
        Ok(())
    }
}
