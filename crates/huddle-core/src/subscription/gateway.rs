//! Binds event-bus topics to live client streams.
//!
//! The subscriber's session is captured once when the stream is opened and
//! held for its lifetime. The bus registration is made eagerly, so events
//! published after `conversation_created` returns are delivered even if the
//! stream has not been polled yet. Dropping the stream deregisters it.
//!
//! The default policy is `ParticipantsOnly`, which is stricter than the
//! historical wire contract: there `conversationCreated` had no
//! authorization filter and accepted anonymous subscribers. Set
//! `fanout_policy = "broadcast"` in `config.toml` to get that behavior back.

use std::sync::Arc;

use futures_util::stream::{Stream, StreamExt};
use huddle_types::config::FanoutPolicy;
use huddle_types::conversation::{Conversation, ConversationId};
use huddle_types::error::ConversationError;
use huddle_types::event::{CONVERSATION_CREATED, DomainEvent, MESSAGE_CREATED};
use huddle_types::message::Message;
use huddle_types::session::SessionContext;
use huddle_types::user::UserId;

use crate::event::EventBus;

/// Per-subscriber delivery decision.
#[derive(Debug, Clone)]
pub struct DeliveryFilter {
    policy: FanoutPolicy,
    viewer: Option<UserId>,
}

impl DeliveryFilter {
    /// Build the filter for a subscriber.
    ///
    /// `ParticipantsOnly` needs to know who is watching, so it rejects
    /// anonymous subscribers up front.
    pub fn for_context(
        policy: FanoutPolicy,
        ctx: &SessionContext,
    ) -> Result<Self, ConversationError> {
        let viewer = ctx.user().map(|u| u.id);
        if policy == FanoutPolicy::ParticipantsOnly && viewer.is_none() {
            return Err(ConversationError::Unauthorized);
        }
        Ok(Self { policy, viewer })
    }

    /// Decided from the payload alone; no store lookups.
    pub fn allows(&self, event: &DomainEvent) -> bool {
        match (self.policy, &self.viewer) {
            (FanoutPolicy::Broadcast, _) => true,
            (FanoutPolicy::ParticipantsOnly, Some(viewer)) => event.involves(viewer),
            (FanoutPolicy::ParticipantsOnly, None) => false,
        }
    }
}

/// Subscription entry point used by the WebSocket transport.
#[derive(Clone)]
pub struct SubscriptionGateway {
    bus: Arc<EventBus>,
    policy: FanoutPolicy,
}

impl SubscriptionGateway {
    pub fn new(bus: Arc<EventBus>, policy: FanoutPolicy) -> Self {
        Self { bus, policy }
    }

    pub fn policy(&self) -> FanoutPolicy {
        self.policy
    }

    /// Live stream of newly created conversations visible to `ctx`.
    pub fn conversation_created(
        &self,
        ctx: &SessionContext,
    ) -> Result<impl Stream<Item = Conversation> + Send + 'static, ConversationError> {
        let filter = DeliveryFilter::for_context(self.policy, ctx)?;
        let events = self.bus.subscribe(CONVERSATION_CREATED).into_stream();

        Ok(events.filter_map(move |event| {
            let item = match event.as_ref() {
                DomainEvent::ConversationCreated { conversation } if filter.allows(&event) => {
                    Some(conversation.clone())
                }
                _ => None,
            };
            async move { item }
        }))
    }

    /// Live stream of messages posted to one conversation.
    pub fn message_created(
        &self,
        ctx: &SessionContext,
        conversation_id: ConversationId,
    ) -> Result<impl Stream<Item = Message> + Send + 'static, ConversationError> {
        let filter = DeliveryFilter::for_context(self.policy, ctx)?;
        let events = self.bus.subscribe(MESSAGE_CREATED).into_stream();

        Ok(events.filter_map(move |event| {
            let item = match event.as_ref() {
                DomainEvent::MessageCreated { message, .. }
                    if message.conversation_id == conversation_id && filter.allows(&event) =>
                {
                    Some(message.clone())
                }
                _ => None,
            };
            async move { item }
        }))
    }
}
