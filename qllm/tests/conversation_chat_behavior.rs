use std::sync::{Arc, Mutex};

use futures_util::StreamExt;
use qllm::{
    ChatCompletionRequest, ChatCompletionResponse, ChatErrorKind, ChatOptions, ChatProvider,
    ChunkStream, ConversationChat, ConversationStore, FinishReason, Model, ModelCatalog,
    NewConversation, ProviderError, ProviderFuture, ProviderIdentity, Providers, Role,
    StreamChunk, Usage,
};
use qllm::qprovider::VecChunkStream;

const MODEL: &str = "scripted-model";

#[derive(Debug, Default)]
struct ScriptedProvider {
    requests: Mutex<Vec<ChatCompletionRequest>>,
    fail_with: Option<ProviderError>,
    fail_mid_stream: bool,
}

impl ScriptedProvider {
    fn failing(error: ProviderError) -> Self {
        Self {
            fail_with: Some(error),
            ..Self::default()
        }
    }

    fn failing_mid_stream() -> Self {
        Self {
            fail_mid_stream: true,
            ..Self::default()
        }
    }

    fn record(&self, request: ChatCompletionRequest) -> Result<(), ProviderError> {
        self.requests.lock().expect("requests lock").push(request);
        match &self.fail_with {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }

    fn requests(&self) -> Vec<ChatCompletionRequest> {
        self.requests.lock().expect("requests lock").clone()
    }
}

impl ProviderIdentity for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }
}

impl ChatProvider for ScriptedProvider {
    fn generate_chat_completion<'a>(
        &'a self,
        request: ChatCompletionRequest,
    ) -> ProviderFuture<'a, Result<ChatCompletionResponse, ProviderError>> {
        Box::pin(async move {
            self.record(request)?;
            Ok(ChatCompletionResponse::new(
                MODEL,
                "Hi there",
                FinishReason::Stop,
                Usage::new(4, 2),
                Vec::new(),
            ))
        })
    }

    fn stream_chat_completion<'a>(
        &'a self,
        request: ChatCompletionRequest,
    ) -> ProviderFuture<'a, Result<ChunkStream<'a>, ProviderError>> {
        Box::pin(async move {
            self.record(request)?;
            let chunks = if self.fail_mid_stream {
                vec![
                    Ok(StreamChunk::delta(MODEL, "Hi ")),
                    Err(ProviderError::unavailable("scripted", "connection reset")),
                ]
            } else {
                vec![
                    Ok(StreamChunk::delta(MODEL, "Hi ")),
                    Ok(StreamChunk::delta(MODEL, "there")),
                    Ok(StreamChunk::terminal(MODEL, FinishReason::Stop)),
                ]
            };
            Ok(Box::pin(VecChunkStream::new(chunks)) as ChunkStream<'a>)
        })
    }
}

impl ModelCatalog for ScriptedProvider {
    fn list_models<'a>(&'a self) -> ProviderFuture<'a, Result<Vec<Model>, ProviderError>> {
        Box::pin(async { Ok(vec![Model::new(MODEL, "Scripted")]) })
    }
}

fn chat_with(provider: Arc<ScriptedProvider>) -> (ConversationChat, Arc<ConversationStore>, String) {
    let store = Arc::new(ConversationStore::new());
    let conversation = store
        .create_conversation(NewConversation::new().with_title("Chat"))
        .expect("create should succeed");
    let chat = ConversationChat::new(provider, Arc::clone(&store));
    (chat, store, conversation.id.clone())
}

#[tokio::test]
async fn send_records_both_turns_and_activates_the_provider() {
    let provider = Arc::new(ScriptedProvider::default());
    let (chat, store, id) = chat_with(Arc::clone(&provider));

    let reply = chat
        .send(&id, "Hello", ChatOptions::default().with_temperature(0.2))
        .await
        .expect("send should succeed");
    assert_eq!(reply.text, "Hi there");

    let stored = store.require(&id).expect("conversation should exist");
    assert_eq!(stored.messages.len(), 2);
    assert_eq!(stored.messages[0].role, Role::User);
    assert_eq!(stored.messages[0].text(), "Hello");
    assert_eq!(
        stored.messages[0].options.as_ref().and_then(|options| options.temperature),
        Some(0.2)
    );
    assert_eq!(stored.messages[1].role, Role::Assistant);
    assert_eq!(stored.messages[1].text(), "Hi there");
    assert_eq!(stored.messages[1].provider_id, "scripted");
    assert!(stored.is_provider_active("scripted"));

    let requests = provider.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].messages.len(), 1);
    assert_eq!(requests[0].options.temperature, Some(0.2));
}

#[tokio::test]
async fn later_turns_carry_the_stored_history() {
    let provider = Arc::new(ScriptedProvider::default());
    let (chat, _store, id) = chat_with(Arc::clone(&provider));

    chat.send(&id, "First", ChatOptions::default())
        .await
        .expect("first turn should succeed");
    chat.send(&id, "Second", ChatOptions::default())
        .await
        .expect("second turn should succeed");

    let requests = provider.requests();
    let texts = requests[1]
        .messages
        .iter()
        .map(|message| message.text().to_string())
        .collect::<Vec<_>>();
    assert_eq!(texts, vec!["First", "Hi there", "Second"]);
}

#[tokio::test]
async fn failed_turns_store_nothing() {
    let provider = Arc::new(ScriptedProvider::failing(ProviderError::rate_limit(
        "scripted",
        "slow down",
    )));
    let (chat, store, id) = chat_with(provider);

    let error = chat
        .send(&id, "Hello", ChatOptions::default())
        .await
        .expect_err("provider failure should surface");

    assert_eq!(error.kind, ChatErrorKind::Provider);
    assert!(error.provider_error().is_some_and(ProviderError::is_rate_limit));
    assert!(store.require(&id).expect("conversation").messages.is_empty());
}

#[tokio::test]
async fn blank_input_and_unknown_conversations_are_rejected_before_the_provider() {
    let provider = Arc::new(ScriptedProvider::default());
    let (chat, _store, id) = chat_with(Arc::clone(&provider));

    let error = chat
        .send(&id, "   ", ChatOptions::default())
        .await
        .expect_err("blank input should fail");
    assert_eq!(error.kind, ChatErrorKind::InvalidRequest);

    let error = chat
        .send("missing", "Hello", ChatOptions::default())
        .await
        .expect_err("unknown conversation should fail");
    assert_eq!(error.kind, ChatErrorKind::Conversation);
    assert!(
        error
            .conversation_error()
            .is_some_and(|error| error.is_not_found())
    );

    assert!(provider.requests().is_empty());
}

#[tokio::test]
async fn stream_records_the_turn_once_the_terminal_chunk_arrives() {
    let provider = Arc::new(ScriptedProvider::default());
    let (chat, store, id) = chat_with(provider);

    let mut stream = chat.stream(&id, "Hello", ChatOptions::default());
    let mut text = String::new();
    let mut finals = 0;
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.expect("chunk should be ok");
        if let Some(delta) = &chunk.text {
            text.push_str(delta);
        }
        if chunk.is_final() {
            finals += 1;
            assert_eq!(store.require(&id).expect("conversation").messages.len(), 2);
        }
    }

    assert_eq!(text, "Hi there");
    assert_eq!(finals, 1);

    let stored = store.require(&id).expect("conversation should exist");
    assert_eq!(stored.messages[1].text(), "Hi there");
    assert_eq!(stored.messages[1].role, Role::Assistant);
}

#[tokio::test]
async fn interrupted_streams_store_nothing() {
    let provider = Arc::new(ScriptedProvider::failing_mid_stream());
    let (chat, store, id) = chat_with(provider);

    let items = chat
        .stream(&id, "Hello", ChatOptions::default())
        .collect::<Vec<_>>()
        .await;

    assert_eq!(items.len(), 2);
    assert!(items[0].is_ok());
    let error = items[1].as_ref().expect_err("second item is the failure");
    assert_eq!(error.kind, ChatErrorKind::Provider);
    assert!(store.require(&id).expect("conversation").messages.is_empty());
}

#[test]
fn unregistered_providers_cannot_back_a_chat() {
    let providers = Providers::new();
    let error = ConversationChat::from_providers(
        &providers,
        "scripted",
        Arc::new(ConversationStore::new()),
    )
    .expect_err("nothing is registered");

    assert_eq!(error.kind, ChatErrorKind::Provider);
    assert_eq!(error.message, "Provider \"scripted\" not found.");
}

#[test]
fn registered_providers_back_a_chat_under_their_registry_name() {
    let mut providers = Providers::new();
    providers
        .llm_mut()
        .register("primary", || Ok(ScriptedProvider::default()));

    let chat = ConversationChat::from_providers(
        &providers,
        "primary",
        Arc::new(ConversationStore::new()),
    )
    .expect("provider should resolve");
    assert_eq!(chat.provider_id(), "primary");
}
