//! Conversation repository trait definition.

use huddle_types::conversation::{Conversation, ConversationId, NewParticipant};
use huddle_types::error::RepositoryError;
use huddle_types::message::{Message, NewMessage};

/// Repository trait for conversations, participants, and messages.
///
/// Implementations live in huddle-infra (e.g., `SqliteConversationRepository`).
/// Uses native async fn in traits (Rust 2024 edition, no async_trait macro).
pub trait ConversationRepository: Send + Sync {
    /// Create a conversation and all of its participant rows atomically.
    ///
    /// Either the conversation and every participant exist afterwards, or
    /// none of them do. Returns the populated conversation.
    fn create_with_participants(
        &self,
        participants: &[NewParticipant],
    ) -> impl std::future::Future<Output = Result<Conversation, RepositoryError>> + Send;

    /// Every conversation, populated with participants and latest message.
    ///
    /// Callers must not rely on this being filtered by membership.
    fn find_all_with_participants_and_latest_message(
        &self,
    ) -> impl std::future::Future<Output = Result<Vec<Conversation>, RepositoryError>> + Send;

    /// A single populated conversation.
    fn get_by_id(
        &self,
        id: &ConversationId,
    ) -> impl std::future::Future<Output = Result<Option<Conversation>, RepositoryError>> + Send;

    /// Insert a message.
    ///
    /// In the same transaction the owning conversation's latest-message
    /// pointer and `updated_at` move to this message, and the sender's
    /// participant row is marked as having seen it. Other participants'
    /// flags are left as they are. A message stamped earlier than the
    /// current pointer is stored but leaves the pointer in place.
    fn create_message(
        &self,
        message: &NewMessage,
    ) -> impl std::future::Future<Output = Result<Message, RepositoryError>> + Send;

    /// Messages of a conversation, oldest first.
    fn list_messages(
        &self,
        conversation_id: &ConversationId,
    ) -> impl std::future::Future<Output = Result<Vec<Message>, RepositoryError>> + Send;
}
