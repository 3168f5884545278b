//! Conversation state for multi-turn, multi-provider dialogue.
//!
//! A [`ConversationStore`] owns every [`Conversation`] and changes them only through
//! [`reduce`], a pure function from the current [`ConversationState`] and a
//! [`ConversationAction`] to the next state.
//!
//! ```rust
//! use qconversation::{ConversationStore, NewConversation, NewMessage};
//!
//! let store = ConversationStore::new();
//! let conversation = store
//!     .create_conversation(NewConversation::new().with_title("Demo"))
//!     .expect("create should succeed");
//!
//! store
//!     .add_message(conversation.id.clone(), NewMessage::user("Hi", "openai"))
//!     .expect("conversation exists");
//!
//! let stored = store.require(&conversation.id).expect("conversation exists");
//! assert_eq!(stored.messages.len(), 1);
//! assert!(stored.is_provider_active("openai"));
//! assert!(conversation.messages.is_empty());
//! ```

mod action;
mod error;
mod reducer;
mod store;
mod types;

pub use action::ConversationAction;
pub use error::{ConversationError, ConversationErrorKind};
pub use reducer::{ConversationState, ReducerEnvironment, SystemEnvironment, Transition, reduce};
pub use store::ConversationStore;
pub use types::{
    Conversation, ConversationId, ConversationMessage, ConversationMetadata, ConversationPatch,
    MetadataPatch, NewConversation, NewMessage,
};
