//! Actions accepted by the conversation reducer.

use crate::{ConversationId, ConversationPatch, MetadataPatch, NewConversation, NewMessage};

#[derive(Debug, Clone, PartialEq)]
pub enum ConversationAction {
    CreateConversation(NewConversation),
    UpdateConversation {
        id: ConversationId,
        patch: ConversationPatch,
    },
    DeleteConversation {
        id: ConversationId,
    },
    AddMessage {
        id: ConversationId,
        message: NewMessage,
    },
    SetMetadata {
        id: ConversationId,
        metadata: MetadataPatch,
    },
    AddProvider {
        id: ConversationId,
        provider_id: String,
    },
    RemoveProvider {
        id: ConversationId,
        provider_id: String,
    },
    ClearHistory {
        id: ConversationId,
    },
    /// A JSON-serialized conversation.
    ImportConversation {
        payload: String,
    },
}

impl ConversationAction {
    pub fn name(&self) -> &'static str {
        match self {
            Self::CreateConversation(_) => "CREATE_CONVERSATION",
            Self::UpdateConversation { .. } => "UPDATE_CONVERSATION",
            Self::DeleteConversation { .. } => "DELETE_CONVERSATION",
            Self::AddMessage { .. } => "ADD_MESSAGE",
            Self::SetMetadata { .. } => "SET_METADATA",
            Self::AddProvider { .. } => "ADD_PROVIDER",
            Self::RemoveProvider { .. } => "REMOVE_PROVIDER",
            Self::ClearHistory { .. } => "CLEAR_HISTORY",
            Self::ImportConversation { .. } => "IMPORT_CONVERSATION",
        }
    }

    /// The conversation the action targets, when it names one up front.
    pub fn conversation_id(&self) -> Option<&str> {
        match self {
            Self::CreateConversation(_) | Self::ImportConversation { .. } => None,
            Self::UpdateConversation { id, .. }
            | Self::DeleteConversation { id }
            | Self::AddMessage { id, .. }
            | Self::SetMetadata { id, .. }
            | Self::AddProvider { id, .. }
            | Self::RemoveProvider { id, .. }
            | Self::ClearHistory { id } => Some(id),
        }
    }
}
