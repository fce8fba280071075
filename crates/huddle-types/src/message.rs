//! Message types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use std::fmt;

use crate::conversation::ConversationId;
use crate::user::UserId;

/// Unique identifier for a message. UUID v7 keeps ids in creation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub Uuid);

impl MessageId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Sender projection embedded in a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageSender {
    pub id: UserId,
    pub username: Option<String>,
}

/// A message posted to a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub conversation_id: ConversationId,
    pub sender: MessageSender,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

/// Message to be written by the store.
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub id: MessageId,
    pub conversation_id: ConversationId,
    pub sender_id: UserId,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

impl NewMessage {
    pub fn new(conversation_id: ConversationId, sender_id: UserId, body: String) -> Self {
        Self {
            id: MessageId::new(),
            conversation_id,
            sender_id,
            body,
            created_at: Utc::now(),
        }
    }
}

/// Request body for `sendMessage`.
#[derive(Debug, Clone, Deserialize)]
pub struct SendMessageRequest {
    pub body: String,
}
