//! In-memory repository fakes shared by service and gateway tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use huddle_types::conversation::{
    Conversation, ConversationId, NewParticipant, Participant, ParticipantUser,
};
use huddle_types::error::RepositoryError;
use huddle_types::message::{Message, MessageSender, NewMessage};
use huddle_types::session::{Session, SessionContext, SessionUser};
use huddle_types::user::{SearchedUser, User, UserId};

use crate::repository::conversation::ConversationRepository;
use crate::repository::user::UserRepository;

#[derive(Default)]
struct Inner {
    users: HashMap<UserId, User>,
    conversations: Vec<Conversation>,
    messages: Vec<Message>,
    username_updates: usize,
    fail_reads: bool,
    fail_writes: bool,
    /// Simulates a concurrent registration winning the unique index.
    conflict_on_update: bool,
}

/// Shared-state fake implementing every repository trait.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl InMemoryStore {
    pub fn add_user(&self, username: &str) -> UserId {
        let mut user = User::new(None, None);
        user.username = Some(username.to_string());
        let id = user.id;
        self.inner.lock().unwrap().users.insert(id, user);
        id
    }

    pub fn add_user_without_username(&self) -> UserId {
        let user = User::new(None, None);
        let id = user.id;
        self.inner.lock().unwrap().users.insert(id, user);
        id
    }

    pub fn username_of(&self, id: &UserId) -> Option<String> {
        self.inner
            .lock()
            .unwrap()
            .users
            .get(id)
            .and_then(|u| u.username.clone())
    }

    pub fn conversation(&self, id: &ConversationId) -> Option<Conversation> {
        self.inner
            .lock()
            .unwrap()
            .conversations
            .iter()
            .find(|c| c.id == *id)
            .cloned()
    }

    pub fn conversation_count(&self) -> usize {
        self.inner.lock().unwrap().conversations.len()
    }

    pub fn username_updates(&self) -> usize {
        self.inner.lock().unwrap().username_updates
    }

    pub fn fail_reads(&self, fail: bool) {
        self.inner.lock().unwrap().fail_reads = fail;
    }

    pub fn fail_writes(&self, fail: bool) {
        self.inner.lock().unwrap().fail_writes = fail;
    }

    pub fn conflict_on_update(&self, conflict: bool) {
        self.inner.lock().unwrap().conflict_on_update = conflict;
    }

    fn check_read(inner: &Inner) -> Result<(), RepositoryError> {
        if inner.fail_reads {
            return Err(RepositoryError::Query("read failure".to_string()));
        }
        Ok(())
    }

    fn check_write(inner: &Inner) -> Result<(), RepositoryError> {
        if inner.fail_writes {
            return Err(RepositoryError::Query("write failure".to_string()));
        }
        Ok(())
    }
}

/// Authenticated context for `user_id`.
pub fn session_for(user_id: UserId) -> SessionContext {
    SessionContext::authenticated(Session::new(SessionUser {
        id: user_id,
        username: None,
    }))
}

impl ConversationRepository for InMemoryStore {
    async fn create_with_participants(
        &self,
        participants: &[NewParticipant],
    ) -> Result<Conversation, RepositoryError> {
        let mut inner = self.inner.lock().unwrap();
        Self::check_write(&inner)?;

        let id = ConversationId::new();
        let now = Utc::now();
        let participants = participants
            .iter()
            .map(|p| Participant {
                user: ParticipantUser {
                    id: p.user_id,
                    username: inner.users.get(&p.user_id).and_then(|u| u.username.clone()),
                },
                conversation_id: id,
                has_seen_latest_message: p.has_seen_latest_message,
            })
            .collect();
        let conversation = Conversation {
            id,
            participants,
            latest_message: None,
            created_at: now,
            updated_at: now,
        };
        inner.conversations.push(conversation.clone());
        Ok(conversation)
    }

    async fn find_all_with_participants_and_latest_message(
        &self,
    ) -> Result<Vec<Conversation>, RepositoryError> {
        let inner = self.inner.lock().unwrap();
        Self::check_read(&inner)?;
        Ok(inner.conversations.clone())
    }

    async fn get_by_id(&self, id: &ConversationId) -> Result<Option<Conversation>, RepositoryError> {
        let inner = self.inner.lock().unwrap();
        Self::check_read(&inner)?;
        Ok(inner.conversations.iter().find(|c| c.id == *id).cloned())
    }

    async fn create_message(&self, message: &NewMessage) -> Result<Message, RepositoryError> {
        let mut inner = self.inner.lock().unwrap();
        Self::check_write(&inner)?;

        let stored = Message {
            id: message.id,
            conversation_id: message.conversation_id,
            sender: MessageSender {
                id: message.sender_id,
                username: inner
                    .users
                    .get(&message.sender_id)
                    .and_then(|u| u.username.clone()),
            },
            body: message.body.clone(),
            created_at: message.created_at,
        };

        let conversation = inner
            .conversations
            .iter_mut()
            .find(|c| c.id == message.conversation_id)
            .ok_or(RepositoryError::NotFound)?;
        if conversation.updated_at <= stored.created_at {
            conversation.latest_message = Some(stored.clone());
            conversation.updated_at = stored.created_at;
            for p in conversation.participants.iter_mut() {
                if p.user.id == message.sender_id {
                    p.has_seen_latest_message = true;
                }
            }
        }

        inner.messages.push(stored.clone());
        Ok(stored)
    }

    async fn list_messages(
        &self,
        conversation_id: &ConversationId,
    ) -> Result<Vec<Message>, RepositoryError> {
        let inner = self.inner.lock().unwrap();
        Self::check_read(&inner)?;
        Ok(inner
            .messages
            .iter()
            .filter(|m| m.conversation_id == *conversation_id)
            .cloned()
            .collect())
    }
}

impl UserRepository for InMemoryStore {
    async fn create(&self, user: &User) -> Result<User, RepositoryError> {
        let mut inner = self.inner.lock().unwrap();
        Self::check_write(&inner)?;
        inner.users.insert(user.id, user.clone());
        Ok(user.clone())
    }

    async fn get_by_id(&self, id: &UserId) -> Result<Option<User>, RepositoryError> {
        let inner = self.inner.lock().unwrap();
        Self::check_read(&inner)?;
        Ok(inner.users.get(id).cloned())
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, RepositoryError> {
        let inner = self.inner.lock().unwrap();
        Self::check_read(&inner)?;
        Ok(inner
            .users
            .values()
            .find(|u| u.username.as_deref() == Some(username))
            .cloned())
    }

    async fn update_username(&self, id: &UserId, username: &str) -> Result<(), RepositoryError> {
        let mut inner = self.inner.lock().unwrap();
        Self::check_write(&inner)?;
        if inner.conflict_on_update {
            return Err(RepositoryError::Conflict(format!(
                "username '{username}' already exists"
            )));
        }
        inner.username_updates += 1;
        let user = inner.users.get_mut(id).ok_or(RepositoryError::NotFound)?;
        user.username = Some(username.to_string());
        Ok(())
    }

    async fn search(
        &self,
        query: &str,
        exclude: &UserId,
        limit: i64,
    ) -> Result<Vec<SearchedUser>, RepositoryError> {
        let inner = self.inner.lock().unwrap();
        Self::check_read(&inner)?;
        let needle = query.to_lowercase();
        let mut found: Vec<SearchedUser> = inner
            .users
            .values()
            .filter(|u| u.id != *exclude)
            .filter_map(|u| {
                let username = u.username.as_ref()?;
                username.to_lowercase().contains(&needle).then(|| SearchedUser {
                    id: u.id,
                    username: username.clone(),
                })
            })
            .collect();
        found.sort_by(|a, b| a.username.cmp(&b.username));
        found.truncate(limit.max(0) as usize);
        Ok(found)
    }
}
