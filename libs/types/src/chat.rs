//! Conversation and message types

use crate::errors::{MarketError, MarketResult};
use crate::ids::{AdSpaceId, ConversationId, MessageId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const MAX_MESSAGE_LEN: usize = 2000;
pub const PREVIEW_LEN: usize = 120;

/// Two-party conversation, optionally about a specific listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: ConversationId,
    /// Always stored sorted so a pair maps to one key
    pub participants: [UserId; 2],
    pub space_id: Option<AdSpaceId>,
    pub last_message: Option<MessagePreview>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    pub fn has_participant(&self, user: UserId) -> bool {
        self.participants.contains(&user)
    }

    /// The participant that is not `user`
    pub fn other(&self, user: UserId) -> UserId {
        if self.participants[0] == user {
            self.participants[1]
        } else {
            self.participants[0]
        }
    }
}

/// Sort a participant pair into its canonical order
pub fn participant_key(a: UserId, b: UserId) -> [UserId; 2] {
    if a <= b {
        [a, b]
    } else {
        [b, a]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub conversation_id: ConversationId,
    pub sender_id: UserId,
    pub body: String,
    pub created_at: DateTime<Utc>,
    pub read_at: Option<DateTime<Utc>>,
}

impl Message {
    pub fn is_unread_by(&self, user: UserId) -> bool {
        self.sender_id != user && self.read_at.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessagePreview {
    pub message_id: MessageId,
    pub sender_id: UserId,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

impl From<&Message> for MessagePreview {
    fn from(message: &Message) -> Self {
        Self {
            message_id: message.id,
            sender_id: message.sender_id,
            body: message.body.chars().take(PREVIEW_LEN).collect(),
            created_at: message.created_at,
        }
    }
}

/// Trim and check a message body
pub fn normalize_body(body: &str) -> MarketResult<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return Err(MarketError::validation("message body is empty"));
    }
    if trimmed.chars().count() > MAX_MESSAGE_LEN {
        return Err(MarketError::validation(format!(
            "message exceeds {} characters",
            MAX_MESSAGE_LEN
        )));
    }
    Ok(trimmed.to_string())
}

/// Conversation listing entry with the caller's unread count
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationSummary {
    #[serde(flatten)]
    pub conversation: Conversation,
    pub unread_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_participant_key_is_order_independent() {
        let a = UserId::new();
        let b = UserId::new();
        assert_eq!(participant_key(a, b), participant_key(b, a));
    }

    #[test]
    fn test_normalize_body() {
        assert_eq!(normalize_body("  hi there \n").unwrap(), "hi there");
        assert!(normalize_body("   ").is_err());
        assert!(normalize_body(&"x".repeat(MAX_MESSAGE_LEN + 1)).is_err());
        assert!(normalize_body(&"x".repeat(MAX_MESSAGE_LEN)).is_ok());
    }

    #[test]
    fn test_preview_truncates() {
        let message = Message {
            id: MessageId::new(),
            conversation_id: ConversationId::new(),
            sender_id: UserId::new(),
            body: "y".repeat(500),
            created_at: Utc::now(),
            read_at: None,
        };
        let preview = MessagePreview::from(&message);
        assert_eq!(preview.body.chars().count(), PREVIEW_LEN);
    }

    #[test]
    fn test_unread_excludes_own_messages() {
        let sender = UserId::new();
        let reader = UserId::new();
        let message = Message {
            id: MessageId::new(),
            conversation_id: ConversationId::new(),
            sender_id: sender,
            body: "hello".to_string(),
            created_at: Utc::now(),
            read_at: None,
        };
        assert!(message.is_unread_by(reader));
        assert!(!message.is_unread_by(sender));
    }
}
