use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::message::ChatMessage;
use crate::core::time::now_millis;

pub const DEFAULT_SESSION_TITLE: &str = "New Chat";
pub const TITLE_MAX_CHARS: usize = 30;

/// One conversation thread.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatSession {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl ChatSession {
    pub fn new() -> Self {
        let now = now_millis();
        Self {
            id: Uuid::new_v4().to_string(),
            title: DEFAULT_SESSION_TITLE.to_string(),
            messages: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn message(&self, message_id: &str) -> Option<&ChatMessage> {
        self.messages.iter().find(|m| m.id == message_id)
    }

    pub fn message_mut(&mut self, message_id: &str) -> Option<&mut ChatMessage> {
        self.messages.iter_mut().find(|m| m.id == message_id)
    }

    /// The `limit` most recent messages, oldest first.
    pub fn recent_messages(&self, limit: usize) -> &[ChatMessage] {
        let start = self.messages.len().saturating_sub(limit);
        &self.messages[start..]
    }

    pub(crate) fn touch(&mut self) {
        // Keep updated_at monotonic even if the clock goes backwards.
        self.updated_at = now_millis().max(self.updated_at);
    }
}

impl Default for ChatSession {
    fn default() -> Self {
        Self::new()
    }
}

/// Title shown for a session whose first message is `text`.
pub fn derive_title(text: &str) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(TITLE_MAX_CHARS).collect();
    if chars.next().is_some() {
        format!("{head}…")
    } else {
        head
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::message::Role;

    #[test]
    fn short_titles_are_kept_verbatim() {
        assert_eq!(derive_title("Hello there"), "Hello there");
    }

    #[test]
    fn exactly_thirty_chars_has_no_ellipsis() {
        let text = "a".repeat(30);
        assert_eq!(derive_title(&text), text);
    }

    #[test]
    fn long_titles_are_truncated_with_ellipsis() {
        let text = "Explain quantum computing in simple terms that a 10-year-old could understand.";
        let title = derive_title(text);
        assert_eq!(title, "Explain quantum computing in s…");
        assert_eq!(title.chars().count(), 31);
    }

    #[test]
    fn truncation_counts_characters_not_bytes() {
        let text = "é".repeat(31);
        assert_eq!(derive_title(&text), format!("{}…", "é".repeat(30)));
    }

    #[test]
    fn recent_messages_returns_tail() {
        let mut session = ChatSession::new();
        for i in 0..5 {
            session
                .messages
                .push(ChatMessage::new(Role::User, format!("m{i}")));
        }
        let tail: Vec<_> = session
            .recent_messages(2)
            .iter()
            .map(|m| m.content.as_str())
            .collect();
        assert_eq!(tail, vec!["m3", "m4"]);
        assert_eq!(session.recent_messages(10).len(), 5);
    }

    #[test]
    fn serializes_with_camel_case_timestamps() {
        let session = ChatSession::new();
        let json = serde_json::to_value(&session).unwrap();
        assert!(json.get("createdAt").is_some());
        assert!(json.get("updatedAt").is_some());
        assert_eq!(json["title"], DEFAULT_SESSION_TITLE);
    }
}
