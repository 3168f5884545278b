/// Creates a single [`ChatMessage`](crate::ChatMessage) from a role shorthand.
///
/// ```rust
/// use qllm::{Role, q_msg};
///
/// let message = q_msg!(assistant => "Done.");
/// assert_eq!(message.role, Role::Assistant);
/// assert_eq!(message.text(), "Done.");
/// ```
#[macro_export]
macro_rules! q_msg {
    (system => $content:expr $(,)?) => {
        $crate::qprovider::ChatMessage::new($crate::qprovider::Role::System, $content)
    };
    (user => $content:expr $(,)?) => {
        $crate::qprovider::ChatMessage::new($crate::qprovider::Role::User, $content)
    };
    (assistant => $content:expr $(,)?) => {
        $crate::qprovider::ChatMessage::new($crate::qprovider::Role::Assistant, $content)
    };
    ($role:ident => $content:expr $(,)?) => {
        compile_error!("unsupported role: use system, user, or assistant");
    };
}

/// Creates a `Vec<ChatMessage>` from role/content pairs.
///
/// ```rust
/// use qllm::{Role, q_messages};
///
/// let messages = q_messages![
///     system => "You are concise.",
///     user => "Summarize this repository.",
/// ];
///
/// assert_eq!(messages.len(), 2);
/// assert_eq!(messages[0].role, Role::System);
/// assert_eq!(messages[1].role, Role::User);
/// ```
#[macro_export]
macro_rules! q_messages {
    () => {
        Vec::<$crate::qprovider::ChatMessage>::new()
    };
    ($($role:ident => $content:expr),+ $(,)?) => {
        vec![$($crate::q_msg!($role => $content)),+]
    };
}
