//! Data models shared by all provider variants

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Information about a model served by a provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    /// Unique model identifier
    pub id: String,
    /// Human-readable model name
    pub name: String,
    /// Provider name
    pub provider: String,
    /// Short description of the model
    #[serde(default)]
    pub description: String,
    /// Free-form tags (e.g. "code", "chat", "7b")
    #[serde(default)]
    pub tags: Vec<String>,
    /// Maximum context window in tokens, when known
    pub context_size: Option<u32>,
    /// Provider-specific metadata (parameter counts, quantization, ...)
    #[serde(default)]
    pub parameters: HashMap<String, serde_json::Value>,
}

/// Role of a chat message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Instruction context, ordered first in a conversation
    System,
    /// End-user turn
    User,
    /// Model turn
    Assistant,
}

impl Role {
    /// Prefix used when flattening a conversation into a single prompt
    pub fn label(&self) -> &'static str {
        match self {
            Role::System => "System",
            Role::User => "User",
            Role::Assistant => "Assistant",
        }
    }
}

/// A single chat message; sequences form an ordered conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Message role
    pub role: Role,
    /// Message content
    pub content: String,
}

impl Message {
    /// Convenience constructor
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// Best-effort token accounting; backends may omit any field
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Tokens in the prompt
    pub prompt_tokens: Option<u32>,
    /// Tokens in the completion
    pub completion_tokens: Option<u32>,
    /// Total tokens
    pub total_tokens: Option<u32>,
}

/// Result of a non-streaming completion call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionResponse {
    /// Generated text
    pub content: String,
    /// Token usage, when the backend reports it
    pub usage: Option<TokenUsage>,
}

/// One streaming event. `content` is an incremental delta, never the
/// accumulated text; the sequence ends with exactly one `done: true` event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamEvent {
    /// Incremental text delta (may be empty on the terminal event)
    pub content: String,
    /// Terminal marker; the stream is closed once this is true
    pub done: bool,
}

impl StreamEvent {
    /// A non-terminal delta event
    pub fn delta(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            done: false,
        }
    }

    /// The terminal event, carrying the final delta or an empty string
    pub fn finished(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            done: true,
        }
    }
}

/// Flatten an ordered conversation into a single role-prefixed prompt, for
/// backends without a native chat mode.
pub fn flatten_messages(messages: &[Message]) -> String {
    messages
        .iter()
        .map(|m| format!("{}: {}", m.role.label(), m.content))
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flatten_prefixes_roles_in_order() {
        let messages = vec![
            Message::new(Role::System, "You are terse."),
            Message::new(Role::User, "Hi"),
            Message::new(Role::Assistant, "Hello"),
        ];

        assert_eq!(
            flatten_messages(&messages),
            "System: You are terse.\n\nUser: Hi\n\nAssistant: Hello"
        );
    }

    #[test]
    fn role_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Role::System).unwrap(), "\"system\"");
        assert_eq!(
            serde_json::to_string(&Role::Assistant).unwrap(),
            "\"assistant\""
        );
    }
}
