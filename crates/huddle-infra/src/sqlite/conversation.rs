//! SQLite conversation repository implementation.
//!
//! Conversations are read "populated": every participant with its username and
//! the latest message with its sender are joined in, so callers never issue
//! follow-up queries.

use std::collections::HashMap;

use chrono::Utc;
use huddle_core::repository::conversation::ConversationRepository;
use huddle_types::conversation::{
    Conversation, ConversationId, NewParticipant, Participant, ParticipantUser,
};
use huddle_types::error::RepositoryError;
use huddle_types::message::{Message, MessageId, MessageSender, NewMessage};
use huddle_types::user::UserId;
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use super::pool::DatabasePool;
use super::{format_datetime, parse_datetime, parse_uuid};

/// SQLite-backed implementation of `ConversationRepository`.
pub struct SqliteConversationRepository {
    pool: DatabasePool,
}

impl SqliteConversationRepository {
    /// Create a new repository backed by the given database pool.
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

const PARTICIPANT_SELECT: &str = "SELECT p.conversation_id, p.user_id, p.has_seen_latest_message, u.username
     FROM conversation_participants p
     JOIN users u ON u.id = p.user_id";

const MESSAGE_SELECT: &str = "SELECT m.id, m.conversation_id, m.sender_id, m.body, m.created_at, u.username AS sender_username
     FROM messages m
     JOIN users u ON u.id = m.sender_id";

fn query_err(e: sqlx::Error) -> RepositoryError {
    RepositoryError::Query(e.to_string())
}

/// Internal row type for the `conversations` table.
struct ConversationRow {
    id: String,
    latest_message_id: Option<String>,
    created_at: String,
    updated_at: String,
}

impl ConversationRow {
    fn from_row(row: &SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            latest_message_id: row.try_get("latest_message_id")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

fn participant_from_row(row: &SqliteRow) -> Result<Participant, RepositoryError> {
    let conversation_id: String = row.try_get("conversation_id").map_err(query_err)?;
    let user_id: String = row.try_get("user_id").map_err(query_err)?;
    let seen: i64 = row.try_get("has_seen_latest_message").map_err(query_err)?;
    Ok(Participant {
        user: ParticipantUser {
            id: UserId(parse_uuid(&user_id, "user id")?),
            username: row.try_get("username").map_err(query_err)?,
        },
        conversation_id: ConversationId(parse_uuid(&conversation_id, "conversation id")?),
        has_seen_latest_message: seen != 0,
    })
}

fn message_from_row(row: &SqliteRow) -> Result<Message, RepositoryError> {
    let id: String = row.try_get("id").map_err(query_err)?;
    let conversation_id: String = row.try_get("conversation_id").map_err(query_err)?;
    let sender_id: String = row.try_get("sender_id").map_err(query_err)?;
    let created_at: String = row.try_get("created_at").map_err(query_err)?;
    Ok(Message {
        id: MessageId(parse_uuid(&id, "message id")?),
        conversation_id: ConversationId(parse_uuid(&conversation_id, "conversation id")?),
        sender: MessageSender {
            id: UserId(parse_uuid(&sender_id, "user id")?),
            username: row.try_get("sender_username").map_err(query_err)?,
        },
        body: row.try_get("body").map_err(query_err)?,
        created_at: parse_datetime(&created_at)?,
    })
}

/// Stitch conversation rows together with their participants and latest messages.
fn assemble(
    rows: Vec<ConversationRow>,
    participants: Vec<Participant>,
    latest: Vec<Message>,
) -> Result<Vec<Conversation>, RepositoryError> {
    let mut by_conversation: HashMap<ConversationId, Vec<Participant>> = HashMap::new();
    for p in participants {
        by_conversation.entry(p.conversation_id).or_default().push(p);
    }
    let mut latest_by_id: HashMap<MessageId, Message> =
        latest.into_iter().map(|m| (m.id, m)).collect();

    rows.into_iter()
        .map(|row| {
            let id = ConversationId(parse_uuid(&row.id, "conversation id")?);
            let latest_message = match row.latest_message_id {
                Some(ref mid) => latest_by_id.remove(&MessageId(parse_uuid(mid, "message id")?)),
                None => None,
            };
            Ok(Conversation {
                id,
                participants: by_conversation.remove(&id).unwrap_or_default(),
                latest_message,
                created_at: parse_datetime(&row.created_at)?,
                updated_at: parse_datetime(&row.updated_at)?,
            })
        })
        .collect()
}

impl ConversationRepository for SqliteConversationRepository {
    async fn create_with_participants(
        &self,
        participants: &[NewParticipant],
    ) -> Result<Conversation, RepositoryError> {
        let id = ConversationId::new();
        let now = Utc::now();
        let now_str = format_datetime(&now);

        let mut tx = self.pool.writer.begin().await.map_err(query_err)?;

        sqlx::query(
            "INSERT INTO conversations (id, latest_message_id, created_at, updated_at)
             VALUES (?, NULL, ?, ?)",
        )
        .bind(id.to_string())
        .bind(&now_str)
        .bind(&now_str)
        .execute(&mut *tx)
        .await
        .map_err(query_err)?;

        for p in participants {
            sqlx::query(
                "INSERT INTO conversation_participants (conversation_id, user_id, has_seen_latest_message, created_at)
                 VALUES (?, ?, ?, ?)",
            )
            .bind(id.to_string())
            .bind(p.user_id.to_string())
            .bind(p.has_seen_latest_message)
            .bind(&now_str)
            .execute(&mut *tx)
            .await
            .map_err(query_err)?;
        }

        let rows = sqlx::query(&format!(
            "{PARTICIPANT_SELECT} WHERE p.conversation_id = ? ORDER BY p.rowid"
        ))
        .bind(id.to_string())
        .fetch_all(&mut *tx)
        .await
        .map_err(query_err)?;
        let participants = rows
            .iter()
            .map(participant_from_row)
            .collect::<Result<Vec<_>, _>>()?;

        tx.commit().await.map_err(query_err)?;

        Ok(Conversation {
            id,
            participants,
            latest_message: None,
            created_at: now,
            updated_at: now,
        })
    }

    async fn find_all_with_participants_and_latest_message(
        &self,
    ) -> Result<Vec<Conversation>, RepositoryError> {
        let rows = sqlx::query("SELECT * FROM conversations ORDER BY updated_at DESC")
            .fetch_all(&self.pool.reader)
            .await
            .map_err(query_err)?;
        let rows = rows
            .iter()
            .map(ConversationRow::from_row)
            .collect::<Result<Vec<_>, _>>()
            .map_err(query_err)?;

        let participants = sqlx::query(&format!("{PARTICIPANT_SELECT} ORDER BY p.rowid"))
            .fetch_all(&self.pool.reader)
            .await
            .map_err(query_err)?
            .iter()
            .map(participant_from_row)
            .collect::<Result<Vec<_>, _>>()?;

        let latest = sqlx::query(&format!(
            "{MESSAGE_SELECT} JOIN conversations c ON c.latest_message_id = m.id"
        ))
        .fetch_all(&self.pool.reader)
        .await
        .map_err(query_err)?
        .iter()
        .map(message_from_row)
        .collect::<Result<Vec<_>, _>>()?;

        assemble(rows, participants, latest)
    }

    async fn get_by_id(&self, id: &ConversationId) -> Result<Option<Conversation>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM conversations WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(query_err)?;
        let Some(row) = row else {
            return Ok(None);
        };
        let row = ConversationRow::from_row(&row).map_err(query_err)?;

        let participants = sqlx::query(&format!(
            "{PARTICIPANT_SELECT} WHERE p.conversation_id = ? ORDER BY p.rowid"
        ))
        .bind(id.to_string())
        .fetch_all(&self.pool.reader)
        .await
        .map_err(query_err)?
        .iter()
        .map(participant_from_row)
        .collect::<Result<Vec<_>, _>>()?;

        let latest = match row.latest_message_id {
            Some(ref mid) => sqlx::query(&format!("{MESSAGE_SELECT} WHERE m.id = ?"))
                .bind(mid)
                .fetch_optional(&self.pool.reader)
                .await
                .map_err(query_err)?
                .map(|r| message_from_row(&r))
                .transpose()?
                .into_iter()
                .collect(),
            None => Vec::new(),
        };

        Ok(assemble(vec![row], participants, latest)?.into_iter().next())
    }

    async fn create_message(&self, message: &NewMessage) -> Result<Message, RepositoryError> {
        let conversation_id = message.conversation_id.to_string();
        let sender_id = message.sender_id.to_string();
        let created_at = format_datetime(&message.created_at);

        let mut tx = self.pool.writer.begin().await.map_err(query_err)?;

        let exists = sqlx::query("SELECT 1 FROM conversations WHERE id = ?")
            .bind(&conversation_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(query_err)?;
        if exists.is_none() {
            return Err(RepositoryError::NotFound);
        }

        sqlx::query(
            "INSERT INTO messages (id, conversation_id, sender_id, body, created_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(message.id.to_string())
        .bind(&conversation_id)
        .bind(&sender_id)
        .bind(&message.body)
        .bind(&created_at)
        .execute(&mut *tx)
        .await
        .map_err(query_err)?;

        // A message stamped before the current pointer never replaces it.
        let moved = sqlx::query(
            "UPDATE conversations SET latest_message_id = ?, updated_at = ?
             WHERE id = ? AND updated_at <= ?",
        )
        .bind(message.id.to_string())
        .bind(&created_at)
        .bind(&conversation_id)
        .bind(&created_at)
        .execute(&mut *tx)
        .await
        .map_err(query_err)?;

        if moved.rows_affected() > 0 {
            sqlx::query(
                "UPDATE conversation_participants
                 SET has_seen_latest_message = 1
                 WHERE conversation_id = ? AND user_id = ?",
            )
            .bind(&conversation_id)
            .bind(&sender_id)
            .execute(&mut *tx)
            .await
            .map_err(query_err)?;
        }

        let row = sqlx::query(&format!("{MESSAGE_SELECT} WHERE m.id = ?"))
            .bind(message.id.to_string())
            .fetch_one(&mut *tx)
            .await
            .map_err(query_err)?;
        let stored = message_from_row(&row)?;

        tx.commit().await.map_err(query_err)?;

        Ok(stored)
    }

    async fn list_messages(
        &self,
        conversation_id: &ConversationId,
    ) -> Result<Vec<Message>, RepositoryError> {
        sqlx::query(&format!(
            "{MESSAGE_SELECT} WHERE m.conversation_id = ? ORDER BY m.created_at ASC, m.rowid ASC"
        ))
        .bind(conversation_id.to_string())
        .fetch_all(&self.pool.reader)
        .await
        .map_err(query_err)?
        .iter()
        .map(message_from_row)
        .collect()
    }
}
