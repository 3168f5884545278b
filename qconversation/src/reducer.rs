//! Pure state transitions over the conversation set.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use qprovider::{MessageContent, Role};

use crate::{
    Conversation, ConversationAction, ConversationError, ConversationId, ConversationMessage,
    ConversationMetadata, NewConversation, NewMessage,
};

/// Source of fresh ids and the current time.
pub trait ReducerEnvironment: Send + Sync {
    fn next_id(&self) -> String;
    fn now(&self) -> DateTime<Utc>;
}

/// Time-ordered UUIDs and the system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemEnvironment;

impl ReducerEnvironment for SystemEnvironment {
    fn next_id(&self) -> String {
        qcommon::generate_id()
    }

    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// An immutable snapshot of every conversation.
///
/// Cloning is cheap. Transitions copy the outer map and share every entry they leave
/// untouched, so `Arc::ptr_eq` holds for unmodified conversations across snapshots.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ConversationState {
    conversations: Arc<HashMap<ConversationId, Arc<Conversation>>>,
}

impl ConversationState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &str) -> Option<Arc<Conversation>> {
        self.conversations.get(id).cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.conversations.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.conversations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conversations.is_empty()
    }

    pub fn ids(&self) -> Vec<ConversationId> {
        self.conversations.keys().cloned().collect()
    }

    pub fn conversations(&self) -> impl Iterator<Item = &Arc<Conversation>> {
        self.conversations.values()
    }

    fn require(&self, id: &str) -> Result<&Arc<Conversation>, ConversationError> {
        self.conversations
            .get(id)
            .ok_or_else(|| ConversationError::not_found(id))
    }

    fn with_entry(&self, conversation: Conversation) -> Self {
        let mut next = HashMap::clone(&self.conversations);
        next.insert(conversation.id.clone(), Arc::new(conversation));
        Self {
            conversations: Arc::new(next),
        }
    }

    fn without_entry(&self, id: &str) -> Self {
        let mut next = HashMap::clone(&self.conversations);
        next.remove(id);
        Self {
            conversations: Arc::new(next),
        }
    }
}

impl FromIterator<Conversation> for ConversationState {
    fn from_iter<I: IntoIterator<Item = Conversation>>(iter: I) -> Self {
        let conversations = iter
            .into_iter()
            .map(|conversation| (conversation.id.clone(), Arc::new(conversation)))
            .collect();

        Self {
            conversations: Arc::new(conversations),
        }
    }
}

/// The state after an action and the conversation it touched.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub state: ConversationState,
    /// `None` only when a delete found nothing to remove.
    pub conversation_id: Option<ConversationId>,
}

impl Transition {
    fn touched(state: ConversationState, id: ConversationId) -> Self {
        Self {
            state,
            conversation_id: Some(id),
        }
    }

    pub fn conversation(&self) -> Option<Arc<Conversation>> {
        self.conversation_id
            .as_deref()
            .and_then(|id| self.state.get(id))
    }
}

/// Computes the next state. `state` is never modified; on error nothing changes.
pub fn reduce(
    state: &ConversationState,
    action: ConversationAction,
    environment: &dyn ReducerEnvironment,
) -> Result<Transition, ConversationError> {
    match action {
        ConversationAction::CreateConversation(payload) => {
            let conversation = create(payload, environment);
            let id = conversation.id.clone();
            Ok(Transition::touched(state.with_entry(conversation), id))
        }
        ConversationAction::UpdateConversation { id, patch } => {
            update(state, id, environment, |conversation, _| {
                if let Some(providers) = patch.active_providers {
                    conversation.active_providers = providers;
                }
                conversation.metadata.merge(patch.metadata);
                Ok(())
            })
        }
        ConversationAction::DeleteConversation { id } => {
            if state.contains(&id) {
                Ok(Transition::touched(state.without_entry(&id), id))
            } else {
                Ok(Transition {
                    state: state.clone(),
                    conversation_id: None,
                })
            }
        }
        ConversationAction::AddMessage { id, message } => {
            update(state, id, environment, |conversation, now| {
                append_message(conversation, environment.next_id(), message, now);
                Ok(())
            })
        }
        ConversationAction::SetMetadata { id, metadata } => {
            update(state, id, environment, |conversation, _| {
                conversation.metadata.merge(metadata);
                Ok(())
            })
        }
        ConversationAction::AddProvider { id, provider_id } => {
            update(state, id, environment, |conversation, _| {
                conversation.active_providers.insert(provider_id);
                Ok(())
            })
        }
        ConversationAction::RemoveProvider { id, provider_id } => {
            update(state, id, environment, |conversation, _| {
                if conversation.active_providers.remove(&provider_id) {
                    Ok(())
                } else {
                    Err(ConversationError::invalid_operation(
                        conversation.id.clone(),
                        format!("Provider \"{provider_id}\" is not active in this conversation."),
                    ))
                }
            })
        }
        ConversationAction::ClearHistory { id } => {
            update(state, id, environment, |conversation, _| {
                conversation.messages.clear();
                Ok(())
            })
        }
        ConversationAction::ImportConversation { payload } => {
            let conversation = parse_import(&payload)?;
            let id = conversation.id.clone();
            Ok(Transition::touched(state.with_entry(conversation), id))
        }
    }
}

fn create(payload: NewConversation, environment: &dyn ReducerEnvironment) -> Conversation {
    let id = environment.next_id();
    let now = environment.now();

    let mut metadata = ConversationMetadata::new(format!("Conversation {id}"), now);
    metadata.merge(payload.metadata);

    let mut conversation = Conversation {
        id,
        messages: Vec::new(),
        metadata,
        active_providers: payload.providers.iter().cloned().collect::<BTreeSet<_>>(),
    };

    if let Some(text) = payload.initial_message {
        let owner = payload.providers.first().cloned().unwrap_or_default();
        conversation.messages.push(ConversationMessage {
            id: environment.next_id(),
            role: Role::User,
            content: MessageContent::text(text),
            timestamp: now,
            provider_id: owner,
            options: None,
        });
    }

    conversation
}

/// Clones the target, applies `apply`, and refreshes `updatedAt`.
///
/// Existence is checked before the environment is consulted, so an unknown id mints no
/// ids and reads no clock.
fn update<F>(
    state: &ConversationState,
    id: ConversationId,
    environment: &dyn ReducerEnvironment,
    apply: F,
) -> Result<Transition, ConversationError>
where
    F: FnOnce(&mut Conversation, DateTime<Utc>) -> Result<(), ConversationError>,
{
    let mut conversation = Conversation::clone(state.require(&id)?);
    let now = environment.now();
    apply(&mut conversation, now)?;
    conversation.metadata.touch(now);

    Ok(Transition::touched(state.with_entry(conversation), id))
}

fn append_message(
    conversation: &mut Conversation,
    message_id: String,
    message: NewMessage,
    now: DateTime<Utc>,
) {
    if !message.provider_id.is_empty() {
        conversation
            .active_providers
            .insert(message.provider_id.clone());
    }

    conversation.messages.push(ConversationMessage {
        id: message_id,
        role: message.role,
        content: message.content,
        timestamp: now,
        provider_id: message.provider_id,
        options: message.options,
    });
}

fn parse_import(payload: &str) -> Result<Conversation, ConversationError> {
    let conversation =
        serde_json::from_str::<Conversation>(payload).map_err(ConversationError::import)?;

    if conversation.id.trim().is_empty() {
        return Err(ConversationError::import("conversation id must not be empty"));
    }

    if conversation.metadata.updated_at < conversation.metadata.created_at {
        return Err(ConversationError::import("updatedAt precedes createdAt"));
    }

    let mut seen = HashSet::with_capacity(conversation.messages.len());
    if let Some(duplicate) = conversation
        .messages
        .iter()
        .find(|message| !seen.insert(message.id.as_str()))
    {
        return Err(ConversationError::import(format!(
            "duplicate message id \"{}\"",
            duplicate.id
        )));
    }

    Ok(conversation)
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use chrono::{Duration, TimeZone};

    use super::*;
    use crate::{ConversationErrorKind, ConversationPatch, MetadataPatch};

    /// Sequential ids and a clock that advances one second per reading.
    struct FixedEnvironment {
        ids: Mutex<u32>,
        ticks: Mutex<i64>,
    }

    impl FixedEnvironment {
        fn new() -> Self {
            Self {
                ids: Mutex::new(0),
                ticks: Mutex::new(0),
            }
        }
    }

    impl ReducerEnvironment for FixedEnvironment {
        fn next_id(&self) -> String {
            let mut ids = self.ids.lock().unwrap();
            *ids += 1;
            format!("id-{ids}")
        }

        fn now(&self) -> DateTime<Utc> {
            let mut ticks = self.ticks.lock().unwrap();
            *ticks += 1;
            Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap() + Duration::seconds(*ticks)
        }
    }

    fn created(environment: &FixedEnvironment, payload: NewConversation) -> (ConversationState, String) {
        let transition = reduce(
            &ConversationState::new(),
            ConversationAction::CreateConversation(payload),
            environment,
        )
        .unwrap();
        let id = transition.conversation_id.clone().unwrap();
        (transition.state, id)
    }

    #[test]
    fn create_defaults_title_and_attributes_initial_message() {
        let environment = FixedEnvironment::new();
        let (state, id) = created(
            &environment,
            NewConversation::new()
                .with_provider("anthropic")
                .with_provider("openai")
                .with_initial_message("hello"),
        );

        let conversation = state.get(&id).unwrap();
        assert_eq!(conversation.metadata.title, "Conversation id-1");
        assert_eq!(conversation.messages.len(), 1);
        assert_eq!(conversation.messages[0].provider_id, "anthropic");
        assert_eq!(conversation.messages[0].role, Role::User);
        assert_eq!(conversation.active_providers.len(), 2);
        assert_eq!(conversation.metadata.created_at, conversation.metadata.updated_at);
    }

    #[test]
    fn initial_message_without_providers_has_empty_owner() {
        let environment = FixedEnvironment::new();
        let (state, id) = created(&environment, NewConversation::new().with_initial_message("hi"));

        let conversation = state.get(&id).unwrap();
        assert_eq!(conversation.messages[0].provider_id, "");
        assert!(conversation.active_providers.is_empty());
    }

    #[test]
    fn rejected_add_message_consumes_no_id_or_clock_reading() {
        let environment = FixedEnvironment::new();
        let (state, id) = created(&environment, NewConversation::new());

        let error = reduce(
            &state,
            ConversationAction::AddMessage {
                id: "missing".to_string(),
                message: NewMessage::user("lost", "openai"),
            },
            &environment,
        )
        .unwrap_err();
        assert_eq!(error.kind, ConversationErrorKind::NotFound);
        assert_eq!(*environment.ids.lock().unwrap(), 1);
        assert_eq!(*environment.ticks.lock().unwrap(), 1);

        let next = reduce(
            &state,
            ConversationAction::AddMessage {
                id: id.clone(),
                message: NewMessage::user("kept", "openai"),
            },
            &environment,
        )
        .unwrap();
        assert_eq!(next.state.get(&id).unwrap().messages[0].id, "id-2");
    }

    #[test]
    fn updates_share_untouched_entries() {
        let environment = FixedEnvironment::new();
        let (state, first) = created(&environment, NewConversation::new());
        let second = reduce(
            &state,
            ConversationAction::CreateConversation(NewConversation::new()),
            &environment,
        )
        .unwrap();
        let second_id = second.conversation_id.clone().unwrap();

        let next = reduce(
            &second.state,
            ConversationAction::SetMetadata {
                id: first.clone(),
                metadata: MetadataPatch::new().with_title("Renamed"),
            },
            &environment,
        )
        .unwrap();

        assert!(Arc::ptr_eq(
            &second.state.get(&second_id).unwrap(),
            &next.state.get(&second_id).unwrap()
        ));
        assert_eq!(second.state.get(&first).unwrap().metadata.title, "Conversation id-1");
        assert_eq!(next.state.get(&first).unwrap().metadata.title, "Renamed");
    }

    #[test]
    fn same_action_on_equal_states_gives_equal_results() {
        let (left, id) = created(&FixedEnvironment::new(), NewConversation::new());
        let (right, _) = created(&FixedEnvironment::new(), NewConversation::new());
        assert_eq!(left, right);

        let action = ConversationAction::AddProvider {
            id,
            provider_id: "google".to_string(),
        };
        let left_env = FixedEnvironment::new();
        let right_env = FixedEnvironment::new();
        let left_next = reduce(&left, action.clone(), &left_env).unwrap();
        let right_next = reduce(&right, action, &right_env).unwrap();

        assert_eq!(left_next, right_next);
        assert_ne!(left_next.state, left);
    }

    #[test]
    fn missing_conversations_fail_before_any_change() {
        let environment = FixedEnvironment::new();
        let (state, _) = created(&environment, NewConversation::new());
        let before = state.clone();

        let actions = [
            ConversationAction::UpdateConversation {
                id: "nope".to_string(),
                patch: ConversationPatch::new(),
            },
            ConversationAction::AddMessage {
                id: "nope".to_string(),
                message: NewMessage::user("hi", "openai"),
            },
            ConversationAction::SetMetadata {
                id: "nope".to_string(),
                metadata: MetadataPatch::new(),
            },
            ConversationAction::AddProvider {
                id: "nope".to_string(),
                provider_id: "openai".to_string(),
            },
            ConversationAction::RemoveProvider {
                id: "nope".to_string(),
                provider_id: "openai".to_string(),
            },
            ConversationAction::ClearHistory {
                id: "nope".to_string(),
            },
        ];

        for action in actions {
            let error = reduce(&state, action, &environment).unwrap_err();
            assert_eq!(error.kind, ConversationErrorKind::NotFound);
            assert_eq!(error.conversation_id.as_deref(), Some("nope"));
        }
        assert_eq!(state, before);
    }

    #[test]
    fn remove_inactive_provider_is_rejected() {
        let environment = FixedEnvironment::new();
        let (state, id) = created(&environment, NewConversation::new().with_provider("openai"));

        let error = reduce(
            &state,
            ConversationAction::RemoveProvider {
                id: id.clone(),
                provider_id: "google".to_string(),
            },
            &environment,
        )
        .unwrap_err();
        assert!(error.is_invalid_operation());

        let removed = reduce(
            &state,
            ConversationAction::RemoveProvider {
                id: id.clone(),
                provider_id: "openai".to_string(),
            },
            &environment,
        )
        .unwrap();
        let conversation = removed.conversation().unwrap();
        assert!(conversation.active_providers.is_empty());
        assert!(conversation.metadata.updated_at > conversation.metadata.created_at);
    }

    #[test]
    fn add_message_assigns_ids_and_activates_provider() {
        let environment = FixedEnvironment::new();
        let (state, id) = created(&environment, NewConversation::new());

        let first = reduce(
            &state,
            ConversationAction::AddMessage {
                id: id.clone(),
                message: NewMessage::user("Hi", "openai"),
            },
            &environment,
        )
        .unwrap();
        let second = reduce(
            &first.state,
            ConversationAction::AddMessage {
                id: id.clone(),
                message: NewMessage::assistant("Hello", "openai"),
            },
            &environment,
        )
        .unwrap();

        let conversation = second.conversation().unwrap();
        assert_eq!(conversation.messages.len(), 2);
        assert_ne!(conversation.messages[0].id, conversation.messages[1].id);
        assert!(conversation.is_provider_active("openai"));
        assert_eq!(conversation.metadata.updated_at, conversation.messages[1].timestamp);
    }

    #[test]
    fn clear_history_keeps_providers_and_delete_is_idempotent() {
        let environment = FixedEnvironment::new();
        let (state, id) = created(
            &environment,
            NewConversation::new()
                .with_provider("openai")
                .with_initial_message("hi"),
        );

        let cleared = reduce(
            &state,
            ConversationAction::ClearHistory { id: id.clone() },
            &environment,
        )
        .unwrap();
        let conversation = cleared.conversation().unwrap();
        assert!(conversation.messages.is_empty());
        assert!(conversation.is_provider_active("openai"));

        let deleted = reduce(
            &cleared.state,
            ConversationAction::DeleteConversation { id: id.clone() },
            &environment,
        )
        .unwrap();
        assert!(deleted.state.is_empty());

        let again = reduce(
            &deleted.state,
            ConversationAction::DeleteConversation { id },
            &environment,
        )
        .unwrap();
        assert_eq!(again.conversation_id, None);
        assert_eq!(again.state, deleted.state);
    }

    #[test]
    fn import_rejects_structurally_invalid_payloads() {
        let environment = FixedEnvironment::new();
        let state = ConversationState::new();

        let missing_metadata = r#"{"id":"c-1","messages":[],"activeProviders":[]}"#;
        let error = reduce(
            &state,
            ConversationAction::ImportConversation {
                payload: missing_metadata.to_string(),
            },
            &environment,
        )
        .unwrap_err();
        assert_eq!(error.kind, ConversationErrorKind::Other);
        assert!(error.message.contains("Failed to import conversation"));

        let duplicate_ids = r#"{
            "id": "c-1",
            "messages": [
                {"id": "m", "role": "user", "content": {"type": "text", "text": "a"}, "timestamp": "2026-01-01T00:00:00Z"},
                {"id": "m", "role": "user", "content": {"type": "text", "text": "b"}, "timestamp": "2026-01-01T00:00:00Z"}
            ],
            "metadata": {"createdAt": "2026-01-01T00:00:00Z", "updatedAt": "2026-01-01T00:00:00Z"},
            "activeProviders": []
        }"#;
        let error = reduce(
            &state,
            ConversationAction::ImportConversation {
                payload: duplicate_ids.to_string(),
            },
            &environment,
        )
        .unwrap_err();
        assert!(error.message.contains("duplicate message id"));
    }
}
