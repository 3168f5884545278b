use std::sync::Arc;
use std::sync::atomic::{AtomicI64, AtomicU32, Ordering};

use chrono::{DateTime, Duration, TimeZone, Utc};
use qconversation::{
    ConversationAction, ConversationErrorKind, ConversationPatch, ConversationStore,
    MetadataPatch, NewConversation, NewMessage, ReducerEnvironment,
};
use qprovider::{ChatMessage, MessageContent, Role};
use serde_json::json;

#[derive(Debug, Default)]
struct SteppingEnvironment {
    ids: AtomicU32,
    seconds: AtomicI64,
}

impl ReducerEnvironment for SteppingEnvironment {
    fn next_id(&self) -> String {
        format!("conv-{}", self.ids.fetch_add(1, Ordering::SeqCst) + 1)
    }

    fn now(&self) -> DateTime<Utc> {
        let seconds = self.seconds.fetch_add(1, Ordering::SeqCst) + 1;
        Utc.with_ymd_and_hms(2026, 5, 1, 9, 0, 0).unwrap() + Duration::seconds(seconds)
    }
}

fn store() -> ConversationStore {
    ConversationStore::with_environment(Arc::new(SteppingEnvironment::default()))
}

#[test]
fn create_then_add_message_tracks_the_provider() {
    let store = store();

    let created = store
        .dispatch(ConversationAction::CreateConversation(
            NewConversation::new().with_title("Demo"),
        ))
        .expect("create should succeed")
        .conversation()
        .expect("created conversation should be present");
    assert!(!created.id.is_empty());
    assert!(created.messages.is_empty());
    assert_eq!(created.metadata.title, "Demo");

    store
        .dispatch(ConversationAction::AddMessage {
            id: created.id.clone(),
            message: NewMessage::from(ChatMessage::user(MessageContent::text("Hi")).with_provider("openai")),
        })
        .expect("add should succeed");

    let stored = store.require(&created.id).expect("conversation should exist");
    assert_eq!(stored.messages.len(), 1);
    assert_eq!(stored.messages[0].role, Role::User);
    assert_eq!(stored.messages[0].text(), "Hi");
    assert!(stored.active_providers.contains("openai"));
    assert!(stored.metadata.updated_at >= stored.metadata.created_at);
}

#[test]
fn add_message_to_unknown_conversation_leaves_state_unchanged() {
    let store = store();
    store
        .create_conversation(NewConversation::new().with_initial_message("seed"))
        .expect("create should succeed");
    let before = store.snapshot().expect("snapshot should succeed");

    let error = store
        .add_message("missing", NewMessage::user("Hi", "openai"))
        .expect_err("unknown id should fail");

    assert_eq!(error.kind, ConversationErrorKind::NotFound);
    assert_eq!(store.snapshot().expect("snapshot should succeed"), before);
}

#[test]
fn removing_an_inactive_provider_keeps_updated_at() {
    let store = store();
    let conversation = store
        .create_conversation(NewConversation::new().with_provider("anthropic"))
        .expect("create should succeed");

    let error = store
        .remove_provider(conversation.id.clone(), "openai")
        .expect_err("inactive provider should be rejected");
    assert_eq!(error.kind, ConversationErrorKind::InvalidOperation);

    let stored = store.require(&conversation.id).expect("conversation should exist");
    assert_eq!(stored.metadata.updated_at, conversation.metadata.updated_at);
    assert!(Arc::ptr_eq(&stored, &conversation));
}

#[test]
fn import_without_metadata_fails_with_conversation_error() {
    let store = store();

    let error = store
        .import_conversation(r#"{"id":"c-9","messages":[],"activeProviders":["openai"]}"#)
        .expect_err("missing metadata should fail");

    assert_eq!(error.kind, ConversationErrorKind::Other);
    assert!(error.message.contains("Failed to import conversation"));
    assert!(store.is_empty().expect("store should be readable"));
}

#[test]
fn export_then_import_round_trips_into_a_fresh_store() {
    let source = store();
    let conversation = source
        .create_conversation(
            NewConversation::new()
                .with_title("Trip planning")
                .with_provider("openai")
                .with_provider("google")
                .with_initial_message("Plan a weekend in Lisbon"),
        )
        .expect("create should succeed");
    source
        .add_message(conversation.id.clone(), NewMessage::assistant("Day one: Alfama.", "google"))
        .expect("add should succeed");

    let exported = source
        .export_conversation(&conversation.id)
        .expect("export should succeed");
    let value: serde_json::Value = serde_json::from_str(&exported).expect("export should be json");
    assert_eq!(value["activeProviders"], json!(["google", "openai"]));

    let target = store();
    let imported = target
        .import_conversation(exported)
        .expect("import should succeed");

    assert_eq!(*imported, *source.require(&conversation.id).expect("source conversation"));
}

#[test]
fn update_clear_and_delete() {
    let store = store();
    let conversation = store
        .create_conversation(NewConversation::new().with_initial_message("hello"))
        .expect("create should succeed");
    let id = conversation.id.clone();

    let updated = store
        .update_conversation(
            id.clone(),
            ConversationPatch::new()
                .with_active_providers(["ollama"])
                .with_metadata(MetadataPatch::new().with_description("local only")),
        )
        .expect("update should succeed");
    assert!(updated.is_provider_active("ollama"));
    assert_eq!(updated.metadata.description.as_deref(), Some("local only"));
    assert!(updated.metadata.updated_at > conversation.metadata.updated_at);

    let cleared = store.clear_history(id.clone()).expect("clear should succeed");
    assert!(cleared.messages.is_empty());
    assert!(cleared.is_provider_active("ollama"));

    assert!(store.delete_conversation(id.clone()).expect("delete should succeed"));
    assert!(!store.delete_conversation(id).expect("second delete is a no-op"));
}

#[test]
fn list_search_and_filter_queries() {
    let store = store();
    let first = store
        .create_conversation(NewConversation::new().with_title("Rust borrow checker").with_provider("openai"))
        .expect("create should succeed");
    let second = store
        .create_conversation(NewConversation::new().with_title("Garden notes").with_provider("anthropic"))
        .expect("create should succeed");
    store
        .set_metadata(
            second.id.clone(),
            MetadataPatch::new().with_description("Tomatoes and RUST-coloured leaves"),
        )
        .expect("metadata should merge");
    store
        .add_provider(first.id.clone(), "google")
        .expect("provider should be added");

    let listed = store.list_conversations().expect("list should succeed");
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].id, first.id);

    let found = store.search_conversations("rust").expect("search should succeed");
    assert_eq!(found.len(), 2);
    let found = store.search_conversations("GARDEN").expect("search should succeed");
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id, second.id);

    let by_provider = store
        .conversations_by_provider("google")
        .expect("filter should succeed");
    assert_eq!(by_provider.len(), 1);
    assert_eq!(by_provider[0].id, first.id);

    assert_eq!(store.delete_all_conversations().expect("delete all should succeed"), 2);
    assert!(store.is_empty().expect("store should be readable"));
}
