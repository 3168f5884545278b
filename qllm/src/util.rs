//! Small convenience constructors for common types.

use qprovider::{ChatMessage, ChatOptions};

pub fn system_message(content: impl Into<String>) -> ChatMessage {
    ChatMessage::system(content.into())
}

pub fn user_message(content: impl Into<String>) -> ChatMessage {
    ChatMessage::user(content.into())
}

pub fn assistant_message(content: impl Into<String>) -> ChatMessage {
    ChatMessage::assistant(content.into())
}

pub fn options_for(model: impl Into<String>) -> ChatOptions {
    ChatOptions::default().with_model(model)
}

/// Maps common spellings onto registered provider names.
pub fn parse_provider_name(value: &str) -> Option<&'static str> {
    match value.trim().to_ascii_lowercase().as_str() {
        "openai" | "gpt" => Some("openai"),
        "anthropic" | "claude" => Some("anthropic"),
        "google" | "gemini" => Some("google"),
        "ollama" | "local" => Some("ollama"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use qprovider::Role;

    use super::{options_for, parse_provider_name, system_message, user_message};

    #[test]
    fn parse_provider_name_supports_aliases() {
        assert_eq!(parse_provider_name("OpenAI"), Some("openai"));
        assert_eq!(parse_provider_name(" claude "), Some("anthropic"));
        assert_eq!(parse_provider_name("Gemini"), Some("google"));
        assert_eq!(parse_provider_name("local"), Some("ollama"));
        assert_eq!(parse_provider_name("bedrock"), None);
    }

    #[test]
    fn message_helpers_apply_roles() {
        assert_eq!(system_message("be brief").role, Role::System);

        let message = user_message("hello");
        assert_eq!(message.role, Role::User);
        assert_eq!(message.text(), "hello");
        assert!(message.provider_id.is_none());

        assert_eq!(options_for("gpt-4o").model.as_deref(), Some("gpt-4o"));
    }
}
