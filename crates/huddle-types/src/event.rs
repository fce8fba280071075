//! Domain events published on the event bus.
//!
//! `DomainEvent` is an immutable snapshot taken after the originating write
//! has committed. All variants are Clone + Send + Sync for use with tokio
//! broadcast channels.

use serde::{Deserialize, Serialize};

use crate::conversation::{Conversation, ConversationId};
use crate::message::Message;
use crate::user::UserId;

/// Topic carrying `DomainEvent::ConversationCreated`.
pub const CONVERSATION_CREATED: &str = "CONVERSATION_CREATED";

/// Topic carrying `DomainEvent::MessageCreated`.
pub const MESSAGE_CREATED: &str = "MESSAGE_CREATED";

/// Events emitted by the conversation service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DomainEvent {
    /// A conversation was created, populated with its participants.
    ConversationCreated { conversation: Conversation },

    /// A message was posted. `participant_ids` lets subscribers filter
    /// without another store read.
    MessageCreated {
        message: Message,
        participant_ids: Vec<UserId>,
    },
}

impl DomainEvent {
    /// The bus topic this event is published on.
    pub fn topic(&self) -> &'static str {
        match self {
            DomainEvent::ConversationCreated { .. } => CONVERSATION_CREATED,
            DomainEvent::MessageCreated { .. } => MESSAGE_CREATED,
        }
    }

    pub fn conversation_id(&self) -> ConversationId {
        match self {
            DomainEvent::ConversationCreated { conversation } => conversation.id,
            DomainEvent::MessageCreated { message, .. } => message.conversation_id,
        }
    }

    /// Whether `user_id` participates in the conversation the event is about.
    pub fn involves(&self, user_id: &UserId) -> bool {
        match self {
            DomainEvent::ConversationCreated { conversation } => {
                conversation.has_participant(user_id)
            }
            DomainEvent::MessageCreated {
                participant_ids, ..
            } => participant_ids.contains(user_id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::{Participant, ParticipantUser};
    use crate::message::{MessageId, MessageSender};
    use chrono::Utc;

    fn conversation_with(user_id: UserId) -> Conversation {
        let id = ConversationId::new();
        Conversation {
            id,
            participants: vec![Participant {
                user: ParticipantUser {
                    id: user_id,
                    username: None,
                },
                conversation_id: id,
                has_seen_latest_message: true,
            }],
            latest_message: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_conversation_created_topic_and_involvement() {
        let alice = UserId::new();
        let event = DomainEvent::ConversationCreated {
            conversation: conversation_with(alice),
        };
        assert_eq!(event.topic(), CONVERSATION_CREATED);
        assert!(event.involves(&alice));
        assert!(!event.involves(&UserId::new()));
    }

    #[test]
    fn test_message_created_involvement_uses_participant_ids() {
        let alice = UserId::new();
        let bob = UserId::new();
        let conversation_id = ConversationId::new();
        let event = DomainEvent::MessageCreated {
            message: Message {
                id: MessageId::new(),
                conversation_id,
                sender: MessageSender {
                    id: alice,
                    username: None,
                },
                body: "hi".to_string(),
                created_at: Utc::now(),
            },
            participant_ids: vec![alice, bob],
        };
        assert_eq!(event.topic(), MESSAGE_CREATED);
        assert_eq!(event.conversation_id(), conversation_id);
        assert!(event.involves(&bob));
    }

    #[test]
    fn test_event_serializes_with_type_tag() {
        let event = DomainEvent::ConversationCreated {
            conversation: conversation_with(UserId::new()),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"conversation_created\""));
    }
}
