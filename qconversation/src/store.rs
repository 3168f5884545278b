//! The single-writer conversation store.

use std::sync::{Arc, Mutex, MutexGuard};

use crate::{
    Conversation, ConversationAction, ConversationError, ConversationId, ConversationMessage,
    ConversationPatch, ConversationState, MetadataPatch, NewConversation, NewMessage,
    ReducerEnvironment, SystemEnvironment, Transition, reduce,
};

/// Owns every conversation and applies actions one at a time.
///
/// Reads return snapshots; a held `Arc<Conversation>` never changes underneath its holder.
pub struct ConversationStore {
    state: Mutex<ConversationState>,
    environment: Arc<dyn ReducerEnvironment>,
}

impl std::fmt::Debug for ConversationStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let len = self.state.lock().map(|state| state.len()).ok();
        f.debug_struct("ConversationStore")
            .field("conversations", &len)
            .finish()
    }
}

impl Default for ConversationStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConversationStore {
    pub fn new() -> Self {
        Self::with_environment(Arc::new(SystemEnvironment))
    }

    pub fn with_environment(environment: Arc<dyn ReducerEnvironment>) -> Self {
        Self {
            state: Mutex::new(ConversationState::new()),
            environment,
        }
    }

    /// Applies `action` and replaces the stored state under one lock.
    pub fn dispatch(&self, action: ConversationAction) -> Result<Transition, ConversationError> {
        let mut state = self.lock()?;
        let name = action.name();
        let target = action.conversation_id().map(str::to_string);

        match reduce(&state, action, self.environment.as_ref()) {
            Ok(transition) => {
                *state = transition.state.clone();
                tracing::debug!(
                    phase = "conversation",
                    event = "action_applied",
                    action = name,
                    conversation_id = transition.conversation_id.as_deref().unwrap_or(""),
                    conversations = state.len(),
                );
                Ok(transition)
            }
            Err(error) => {
                tracing::debug!(
                    phase = "conversation",
                    event = "action_rejected",
                    action = name,
                    conversation_id = target.as_deref().unwrap_or(""),
                    kind = %error.kind,
                );
                Err(error)
            }
        }
    }

    pub fn snapshot(&self) -> Result<ConversationState, ConversationError> {
        Ok(self.lock()?.clone())
    }

    pub fn get(&self, id: &str) -> Result<Option<Arc<Conversation>>, ConversationError> {
        Ok(self.lock()?.get(id))
    }

    pub fn require(&self, id: &str) -> Result<Arc<Conversation>, ConversationError> {
        self.get(id)?
            .ok_or_else(|| ConversationError::not_found(id))
    }

    pub fn len(&self) -> Result<usize, ConversationError> {
        Ok(self.lock()?.len())
    }

    pub fn is_empty(&self) -> Result<bool, ConversationError> {
        Ok(self.lock()?.is_empty())
    }

    pub fn create_conversation(
        &self,
        payload: NewConversation,
    ) -> Result<Arc<Conversation>, ConversationError> {
        self.dispatch_for_conversation(ConversationAction::CreateConversation(payload))
    }

    pub fn update_conversation(
        &self,
        id: impl Into<ConversationId>,
        patch: ConversationPatch,
    ) -> Result<Arc<Conversation>, ConversationError> {
        self.dispatch_for_conversation(ConversationAction::UpdateConversation {
            id: id.into(),
            patch,
        })
    }

    /// Returns whether anything was removed.
    pub fn delete_conversation(&self, id: impl Into<ConversationId>) -> Result<bool, ConversationError> {
        let transition = self.dispatch(ConversationAction::DeleteConversation { id: id.into() })?;
        Ok(transition.conversation_id.is_some())
    }

    /// Appends a turn and returns it as stored.
    pub fn add_message(
        &self,
        id: impl Into<ConversationId>,
        message: impl Into<NewMessage>,
    ) -> Result<ConversationMessage, ConversationError> {
        let id = id.into();
        let conversation = self.dispatch_for_conversation(ConversationAction::AddMessage {
            id: id.clone(),
            message: message.into(),
        })?;

        conversation
            .messages
            .last()
            .cloned()
            .ok_or_else(|| ConversationError::other(format!("message was not stored in {id}")))
    }

    pub fn set_metadata(
        &self,
        id: impl Into<ConversationId>,
        metadata: MetadataPatch,
    ) -> Result<Arc<Conversation>, ConversationError> {
        self.dispatch_for_conversation(ConversationAction::SetMetadata {
            id: id.into(),
            metadata,
        })
    }

    pub fn add_provider(
        &self,
        id: impl Into<ConversationId>,
        provider_id: impl Into<String>,
    ) -> Result<Arc<Conversation>, ConversationError> {
        self.dispatch_for_conversation(ConversationAction::AddProvider {
            id: id.into(),
            provider_id: provider_id.into(),
        })
    }

    pub fn remove_provider(
        &self,
        id: impl Into<ConversationId>,
        provider_id: impl Into<String>,
    ) -> Result<Arc<Conversation>, ConversationError> {
        self.dispatch_for_conversation(ConversationAction::RemoveProvider {
            id: id.into(),
            provider_id: provider_id.into(),
        })
    }

    pub fn clear_history(
        &self,
        id: impl Into<ConversationId>,
    ) -> Result<Arc<Conversation>, ConversationError> {
        self.dispatch_for_conversation(ConversationAction::ClearHistory { id: id.into() })
    }

    pub fn import_conversation(
        &self,
        payload: impl Into<String>,
    ) -> Result<Arc<Conversation>, ConversationError> {
        self.dispatch_for_conversation(ConversationAction::ImportConversation {
            payload: payload.into(),
        })
    }

    /// Serializes one conversation to the JSON accepted by [`Self::import_conversation`].
    pub fn export_conversation(&self, id: &str) -> Result<String, ConversationError> {
        let conversation = self.require(id)?;
        conversation.to_json().map_err(|error| {
            ConversationError::other(format!("Failed to export conversation: {error}"))
        })
    }

    /// Most recently updated first; ties are ordered by id.
    pub fn list_conversations(&self) -> Result<Vec<Arc<Conversation>>, ConversationError> {
        let state = self.snapshot()?;
        let mut conversations = state.conversations().cloned().collect::<Vec<_>>();
        conversations.sort_by(|left, right| {
            right
                .metadata
                .updated_at
                .cmp(&left.metadata.updated_at)
                .then_with(|| left.id.cmp(&right.id))
        });
        Ok(conversations)
    }

    /// Case-insensitive substring match on title and description.
    pub fn search_conversations(
        &self,
        query: &str,
    ) -> Result<Vec<Arc<Conversation>>, ConversationError> {
        let needle = query.to_lowercase();
        let matches = |text: &str| text.to_lowercase().contains(&needle);

        Ok(self
            .list_conversations()?
            .into_iter()
            .filter(|conversation| {
                matches(&conversation.metadata.title)
                    || conversation
                        .metadata
                        .description
                        .as_deref()
                        .is_some_and(matches)
            })
            .collect())
    }

    pub fn conversations_by_provider(
        &self,
        provider_id: &str,
    ) -> Result<Vec<Arc<Conversation>>, ConversationError> {
        Ok(self
            .list_conversations()?
            .into_iter()
            .filter(|conversation| conversation.is_provider_active(provider_id))
            .collect())
    }

    /// Deletes every conversation in one step and returns how many were removed.
    pub fn delete_all_conversations(&self) -> Result<usize, ConversationError> {
        let mut state = self.lock()?;
        let ids = state.ids();
        let mut next = state.clone();

        for id in &ids {
            let action = ConversationAction::DeleteConversation { id: id.clone() };
            next = reduce(&next, action, self.environment.as_ref())?.state;
        }

        *state = next;
        tracing::debug!(
            phase = "conversation",
            event = "all_deleted",
            removed = ids.len(),
        );
        Ok(ids.len())
    }

    fn dispatch_for_conversation(
        &self,
        action: ConversationAction,
    ) -> Result<Arc<Conversation>, ConversationError> {
        let name = action.name();
        self.dispatch(action)?
            .conversation()
            .ok_or_else(|| ConversationError::other(format!("{name} produced no conversation")))
    }

    fn lock(&self) -> Result<MutexGuard<'_, ConversationState>, ConversationError> {
        self.state
            .lock()
            .map_err(|_| ConversationError::other("conversation store lock poisoned"))
    }
}
