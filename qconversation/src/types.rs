//! The conversation aggregate and the patches actions carry.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use qprovider::{ChatMessage, ChatOptions, MessageContent, Role};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub type ConversationId = String;

/// Timestamps are owned by the reducer and never merged from a patch.
const RESERVED_METADATA_KEYS: [&str; 4] = ["createdAt", "updatedAt", "title", "description"];

/// A stored turn. Ids and timestamps are assigned by the reducer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationMessage {
    pub id: String,
    pub role: Role,
    pub content: MessageContent,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub provider_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<ChatOptions>,
}

impl ConversationMessage {
    pub fn text(&self) -> &str {
        self.content.as_text()
    }

    pub fn to_chat_message(&self) -> ChatMessage {
        let mut message = ChatMessage::new(self.role, self.content.clone())
            .with_timestamp(self.timestamp);
        if !self.provider_id.is_empty() {
            message = message.with_provider(self.provider_id.clone());
        }
        if let Some(options) = &self.options {
            message = message.with_options(options.clone());
        }
        message
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationMetadata {
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Caller-defined extension fields, stored alongside the known ones.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl ConversationMetadata {
    pub fn new(title: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            created_at: now,
            updated_at: now,
            title: title.into(),
            description: None,
            extra: BTreeMap::new(),
        }
    }

    pub fn merge(&mut self, patch: MetadataPatch) {
        if let Some(title) = patch.title {
            self.title = title;
        }
        if let Some(description) = patch.description {
            self.description = Some(description);
        }
        self.extra.extend(
            patch
                .extra
                .into_iter()
                .filter(|(key, _)| !RESERVED_METADATA_KEYS.contains(&key.as_str())),
        );
    }

    /// Moves `updated_at` to `now`, never before `created_at`.
    pub(crate) fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now.max(self.created_at);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: ConversationId,
    pub messages: Vec<ConversationMessage>,
    pub metadata: ConversationMetadata,
    /// Serialized as a sorted, duplicate-free array.
    pub active_providers: BTreeSet<String>,
}

impl Conversation {
    pub fn is_provider_active(&self, provider_id: &str) -> bool {
        self.active_providers.contains(provider_id)
    }

    /// History in the shape chat requests take.
    pub fn chat_messages(&self) -> Vec<ChatMessage> {
        self.messages
            .iter()
            .map(ConversationMessage::to_chat_message)
            .collect()
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Metadata fields to merge; `None` leaves the stored value alone.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl MetadataPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }
}

/// Payload of `CREATE_CONVERSATION`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NewConversation {
    pub metadata: MetadataPatch,
    /// Initial active providers; the first one owns `initial_message`.
    pub providers: Vec<String>,
    pub initial_message: Option<String>,
}

impl NewConversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.metadata.title = Some(title.into());
        self
    }

    pub fn with_metadata(mut self, metadata: MetadataPatch) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_provider(mut self, provider_id: impl Into<String>) -> Self {
        self.providers.push(provider_id.into());
        self
    }

    pub fn with_initial_message(mut self, text: impl Into<String>) -> Self {
        self.initial_message = Some(text.into());
        self
    }
}

/// Payload of `UPDATE_CONVERSATION`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ConversationPatch {
    pub active_providers: Option<BTreeSet<String>>,
    pub metadata: MetadataPatch,
}

impl ConversationPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_active_providers<I, S>(mut self, providers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.active_providers = Some(providers.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_metadata(mut self, metadata: MetadataPatch) -> Self {
        self.metadata = metadata;
        self
    }
}

/// Payload of `ADD_MESSAGE`: everything except the id and timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct NewMessage {
    pub role: Role,
    pub content: MessageContent,
    pub provider_id: String,
    pub options: Option<ChatOptions>,
}

impl NewMessage {
    pub fn new(role: Role, content: impl Into<MessageContent>, provider_id: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            provider_id: provider_id.into(),
            options: None,
        }
    }

    pub fn user(content: impl Into<MessageContent>, provider_id: impl Into<String>) -> Self {
        Self::new(Role::User, content, provider_id)
    }

    pub fn assistant(content: impl Into<MessageContent>, provider_id: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content, provider_id)
    }

    pub fn with_options(mut self, options: ChatOptions) -> Self {
        self.options = Some(options);
        self
    }
}

impl From<ChatMessage> for NewMessage {
    fn from(value: ChatMessage) -> Self {
        Self {
            role: value.role,
            content: value.content,
            provider_id: value.provider_id.unwrap_or_default(),
            options: value.options,
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use serde_json::json;

    use super::*;

    #[test]
    fn active_providers_round_trip_as_a_set() {
        let parsed: Conversation = serde_json::from_value(json!({
            "id": "c-1",
            "messages": [],
            "metadata": {
                "createdAt": "2026-01-01T00:00:00Z",
                "updatedAt": "2026-01-01T00:00:00Z",
                "title": "Demo",
                "pinned": true
            },
            "activeProviders": ["openai", "anthropic", "openai"]
        }))
        .expect("conversation should parse");

        assert_eq!(parsed.active_providers.len(), 2);
        assert_eq!(parsed.metadata.extra.get("pinned"), Some(&json!(true)));

        let value = serde_json::to_value(&parsed).expect("conversation should serialize");
        assert_eq!(value["activeProviders"], json!(["anthropic", "openai"]));
        assert_eq!(value["metadata"]["pinned"], json!(true));
    }

    #[test]
    fn touch_never_moves_before_creation() {
        let created = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        let mut metadata = ConversationMetadata::new("t", created);

        metadata.touch(Utc.with_ymd_and_hms(2026, 2, 1, 0, 0, 0).unwrap());
        assert_eq!(metadata.updated_at, created);

        let later = Utc.with_ymd_and_hms(2026, 3, 2, 0, 0, 0).unwrap();
        metadata.touch(later);
        assert_eq!(metadata.updated_at, later);
    }

    #[test]
    fn metadata_merge_keeps_unset_fields() {
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let mut metadata = ConversationMetadata::new("Original", now);
        metadata.description = Some("kept".to_string());

        metadata.merge(MetadataPatch::new().with_field("lang", json!("en")));

        assert_eq!(metadata.title, "Original");
        assert_eq!(metadata.description.as_deref(), Some("kept"));
        assert_eq!(metadata.extra.get("lang"), Some(&json!("en")));
    }
}
