//! Conversation-layer errors.

use std::error::Error;
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConversationErrorKind {
    /// The id does not resolve in the store.
    NotFound,
    /// The action violates a precondition, e.g. removing an inactive provider.
    InvalidOperation,
    /// Anything else, such as an import that fails to parse.
    Other,
}

impl Display for ConversationErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::NotFound => "ConversationNotFoundError",
            Self::InvalidOperation => "InvalidConversationOperationError",
            Self::Other => "ConversationError",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationError {
    pub kind: ConversationErrorKind,
    pub conversation_id: Option<String>,
    pub message: String,
}

impl ConversationError {
    pub fn new(
        kind: ConversationErrorKind,
        conversation_id: Option<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            conversation_id,
            message: message.into(),
        }
    }

    pub fn not_found(conversation_id: impl Into<String>) -> Self {
        let conversation_id = conversation_id.into();
        let message = format!("Conversation \"{conversation_id}\" not found.");
        Self::new(ConversationErrorKind::NotFound, Some(conversation_id), message)
    }

    pub fn invalid_operation(
        conversation_id: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::new(
            ConversationErrorKind::InvalidOperation,
            Some(conversation_id.into()),
            message,
        )
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self::new(ConversationErrorKind::Other, None, message)
    }

    /// Wraps the cause of a rejected import payload.
    pub fn import(cause: impl Display) -> Self {
        Self::other(format!("Failed to import conversation: {cause}"))
    }

    pub fn is_not_found(&self) -> bool {
        self.kind == ConversationErrorKind::NotFound
    }

    pub fn is_invalid_operation(&self) -> bool {
        self.kind == ConversationErrorKind::InvalidOperation
    }
}

impl Display for ConversationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl Error for ConversationError {}
