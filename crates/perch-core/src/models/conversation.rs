//! Cached conversation models.
//!
//! The engine never owns conversations; it reads the agent backend's cache
//! after a completed turn to recover the last assistant reply (step output
//! or handoff summary).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
    System,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::System => "system",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "assistant" => Self::Assistant,
            "system" => Self::System,
            _ => Self::User,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedMessage {
    pub role: MessageRole,
    pub content: String,
}

/// Snapshot of a conversation as held by the agent backend's cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedConversation {
    pub id: String,
    #[serde(default)]
    pub messages: Vec<CachedMessage>,
}

impl CachedConversation {
    /// Trimmed text of the most recent assistant message, if any.
    pub fn last_assistant_text(&self) -> Option<String> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == MessageRole::Assistant)
            .map(|m| m.content.trim().to_string())
            .filter(|t| !t.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(role: MessageRole, content: &str) -> CachedMessage {
        CachedMessage {
            role,
            content: content.to_string(),
        }
    }

    #[test]
    fn test_last_assistant_text_picks_most_recent() {
        let conv = CachedConversation {
            id: "c1".to_string(),
            messages: vec![
                msg(MessageRole::User, "run it"),
                msg(MessageRole::Assistant, "first"),
                msg(MessageRole::User, "again"),
                msg(MessageRole::Assistant, "  second  "),
            ],
        };
        assert_eq!(conv.last_assistant_text().as_deref(), Some("second"));
    }

    #[test]
    fn test_last_assistant_text_empty_cases() {
        let no_assistant = CachedConversation {
            id: "c1".to_string(),
            messages: vec![msg(MessageRole::User, "hello")],
        };
        assert_eq!(no_assistant.last_assistant_text(), None);

        let blank = CachedConversation {
            id: "c2".to_string(),
            messages: vec![msg(MessageRole::Assistant, "   \n")],
        };
        assert_eq!(blank.last_assistant_text(), None);
    }
}
