//! Conversation service.
//!
//! Orchestrates authorization, the conversation store, and event publication.
//! Every write commits before its event is published, so a subscriber never
//! hears about a conversation or message that a concurrent read cannot see.

use std::collections::HashSet;
use std::sync::Arc;

use huddle_types::conversation::{
    Conversation, ConversationId, CreateConversationResponse, NewParticipant,
};
use huddle_types::error::{ConversationError, RepositoryError};
use huddle_types::event::DomainEvent;
use huddle_types::message::{Message, NewMessage};
use huddle_types::session::SessionContext;
use huddle_types::user::UserId;
use tracing::{debug, info};

use crate::event::EventBus;
use crate::repository::conversation::ConversationRepository;

/// Service orchestrating conversation and message lifecycle.
///
/// Generic over the repository trait so huddle-core never depends on
/// huddle-infra. The event bus is injected, never a global.
pub struct ConversationService<C: ConversationRepository> {
    repo: C,
    bus: Arc<EventBus>,
}

impl<C: ConversationRepository> ConversationService<C> {
    pub fn new(repo: C, bus: Arc<EventBus>) -> Self {
        Self { repo, bus }
    }

    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    /// Conversations the caller participates in, most recently updated first.
    ///
    /// The store is not trusted to filter by membership; the filter is
    /// applied here regardless of what it returns.
    pub async fn list_conversations(
        &self,
        ctx: &SessionContext,
    ) -> Result<Vec<Conversation>, ConversationError> {
        let user = ctx.require_user()?;

        let all = self
            .repo
            .find_all_with_participants_and_latest_message()
            .await
            .map_err(operation_failed)?;

        let mut visible: Vec<Conversation> = all
            .into_iter()
            .filter(|c| c.has_participant(&user.id))
            .collect();
        visible.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));

        debug!(user_id = %user.id, count = visible.len(), "listed conversations");
        Ok(visible)
    }

    /// Create a conversation between the caller and `participant_ids`.
    ///
    /// On success a `ConversationCreated` event carrying the populated
    /// conversation is published. On failure nothing is published.
    pub async fn create_conversation(
        &self,
        ctx: &SessionContext,
        participant_ids: &[UserId],
    ) -> Result<CreateConversationResponse, ConversationError> {
        let user = ctx.require_user()?;
        let participants = build_participants(&user.id, participant_ids);

        let conversation = self
            .repo
            .create_with_participants(&participants)
            .await
            .map_err(operation_failed)?;

        let conversation_id = conversation.id;
        info!(
            %conversation_id,
            creator = %user.id,
            participants = participants.len(),
            "conversation created"
        );

        self.publish(DomainEvent::ConversationCreated { conversation });

        Ok(CreateConversationResponse { conversation_id })
    }

    /// Post a message to a conversation the caller participates in.
    pub async fn send_message(
        &self,
        ctx: &SessionContext,
        conversation_id: &ConversationId,
        body: &str,
    ) -> Result<Message, ConversationError> {
        let user = ctx.require_user()?;

        let body = body.trim();
        if body.is_empty() {
            return Err(ConversationError::InvalidInput(
                "message body cannot be empty".to_string(),
            ));
        }

        let conversation = self.member_conversation(&user.id, conversation_id).await?;

        let message = self
            .repo
            .create_message(&NewMessage::new(*conversation_id, user.id, body.to_string()))
            .await
            .map_err(operation_failed)?;

        info!(%conversation_id, message_id = %message.id, sender = %user.id, "message created");

        self.publish(DomainEvent::MessageCreated {
            message: message.clone(),
            participant_ids: conversation.participant_ids(),
        });

        Ok(message)
    }

    /// Messages of a conversation the caller participates in, oldest first.
    pub async fn list_messages(
        &self,
        ctx: &SessionContext,
        conversation_id: &ConversationId,
    ) -> Result<Vec<Message>, ConversationError> {
        let user = ctx.require_user()?;
        self.member_conversation(&user.id, conversation_id).await?;

        self.repo
            .list_messages(conversation_id)
            .await
            .map_err(operation_failed)
    }

    /// Load a conversation and check that `user_id` is in it.
    async fn member_conversation(
        &self,
        user_id: &UserId,
        conversation_id: &ConversationId,
    ) -> Result<Conversation, ConversationError> {
        let conversation = self
            .repo
            .get_by_id(conversation_id)
            .await
            .map_err(operation_failed)?
            .ok_or(ConversationError::NotFound)?;

        if !conversation.has_participant(user_id) {
            return Err(ConversationError::Unauthorized);
        }
        Ok(conversation)
    }

    /// Delivery is best-effort and never fails the mutation.
    fn publish(&self, event: DomainEvent) {
        let topic = event.topic();
        let delivered = self.bus.publish(topic, event);
        debug!(topic, delivered, "domain event published");
    }
}

/// Participant rows for a new conversation.
///
/// Ids are deduplicated (first occurrence wins) and the creator is appended
/// when absent. Only the creator starts with `has_seen_latest_message`.
pub fn build_participants(creator: &UserId, participant_ids: &[UserId]) -> Vec<NewParticipant> {
    let mut seen = HashSet::with_capacity(participant_ids.len() + 1);
    let mut participants: Vec<NewParticipant> = participant_ids
        .iter()
        .filter(|id| seen.insert(**id))
        .map(|id| NewParticipant {
            user_id: *id,
            has_seen_latest_message: id == creator,
        })
        .collect();

    if !seen.contains(creator) {
        participants.push(NewParticipant {
            user_id: *creator,
            has_seen_latest_message: true,
        });
    }
    participants
}

fn operation_failed(err: RepositoryError) -> ConversationError {
    ConversationError::OperationFailed(err.to_string())
}
