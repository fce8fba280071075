//! Conversation and participant types.
//!
//! A conversation is created once with a fixed participant set. Each
//! participant row tracks whether that user has seen the latest message.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use std::fmt;
use std::str::FromStr;

use crate::message::Message;
use crate::user::UserId;

/// Unique identifier for a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationId(pub Uuid);

impl ConversationId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for ConversationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ConversationId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// The user side of a participant row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantUser {
    pub id: UserId,
    pub username: Option<String>,
}

/// A user's membership in a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub user: ParticipantUser,
    pub conversation_id: ConversationId,
    pub has_seen_latest_message: bool,
}

/// Participant row to be written when a conversation is created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewParticipant {
    pub user_id: UserId,
    pub has_seen_latest_message: bool,
}

/// A conversation populated with its participants and latest message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: ConversationId,
    pub participants: Vec<Participant>,
    pub latest_message: Option<Message>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    /// Whether `user_id` holds a participant row in this conversation.
    pub fn has_participant(&self, user_id: &UserId) -> bool {
        self.participants.iter().any(|p| p.user.id == *user_id)
    }

    pub fn participant_ids(&self) -> Vec<UserId> {
        self.participants.iter().map(|p| p.user.id).collect()
    }
}

/// Request body for `createConversation`.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateConversationRequest {
    pub participant_ids: Vec<UserId>,
}

/// Result of a successful `createConversation` mutation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateConversationResponse {
    pub conversation_id: ConversationId,
}
