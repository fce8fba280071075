//! SQLite-backed bearer session store.
//!
//! Acts as the local identity provider: tokens are issued once, only their
//! SHA-256 hex digest is persisted, and lookups join the owning user so the
//! resolved session carries the current username.

use chrono::{DateTime, Duration, Utc};
use huddle_core::session::IdentityProvider;
use huddle_types::error::RepositoryError;
use huddle_types::session::{Session, SessionUser};
use huddle_types::user::UserId;
use sha2::{Digest, Sha256};
use sqlx::Row;
use uuid::Uuid;

use super::pool::DatabasePool;
use super::{format_datetime, parse_datetime, parse_uuid};

/// Prefix of every issued token.
pub const TOKEN_PREFIX: &str = "huddle_";

/// Lowercase hex SHA-256 of a bearer token.
pub fn hash_token(token: &str) -> String {
    let digest = Sha256::digest(token.as_bytes());
    format!("{:x}", digest)
}

/// A freshly issued session. `token` is only ever available here.
#[derive(Debug, Clone)]
pub struct IssuedSession {
    pub token: String,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Issues and resolves bearer sessions stored in the `sessions` table.
pub struct SqliteSessionStore {
    pool: DatabasePool,
}

impl SqliteSessionStore {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }

    /// Issue a new token for `user_id`. `ttl` of `None` never expires.
    pub async fn issue_session(
        &self,
        user_id: &UserId,
        ttl: Option<Duration>,
    ) -> Result<IssuedSession, RepositoryError> {
        let token = format!(
            "{TOKEN_PREFIX}{}{}",
            Uuid::new_v4().simple(),
            Uuid::new_v4().simple()
        );
        let now = Utc::now();
        let expires_at = ttl.map(|ttl| now + ttl);

        sqlx::query(
            "INSERT INTO sessions (id, token_hash, user_id, created_at, expires_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(Uuid::now_v7().to_string())
        .bind(hash_token(&token))
        .bind(user_id.to_string())
        .bind(format_datetime(&now))
        .bind(expires_at.as_ref().map(format_datetime))
        .execute(&self.pool.writer)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.message().contains("FOREIGN KEY") => {
                RepositoryError::NotFound
            }
            e => RepositoryError::Query(e.to_string()),
        })?;

        tracing::debug!(user_id = %user_id, "issued session");
        Ok(IssuedSession { token, expires_at })
    }

    /// Remove sessions whose expiry lies in the past. Returns how many were removed.
    pub async fn purge_expired(&self) -> Result<u64, RepositoryError> {
        let result =
            sqlx::query("DELETE FROM sessions WHERE expires_at IS NOT NULL AND expires_at <= ?")
                .bind(format_datetime(&Utc::now()))
                .execute(&self.pool.writer)
                .await
                .map_err(|e| RepositoryError::Query(e.to_string()))?;
        Ok(result.rows_affected())
    }
}

impl IdentityProvider for SqliteSessionStore {
    async fn session_for_token(&self, token: &str) -> Result<Option<Session>, RepositoryError> {
        let row = sqlx::query(
            "SELECT s.user_id, s.expires_at, u.username
             FROM sessions s
             JOIN users u ON u.id = s.user_id
             WHERE s.token_hash = ?",
        )
        .bind(hash_token(token))
        .fetch_optional(&self.pool.reader)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let Some(row) = row else {
            return Ok(None);
        };

        let user_id: String = row
            .try_get("user_id")
            .map_err(|e| RepositoryError::Query(e.to_string()))?;
        let expires_at: Option<String> = row
            .try_get("expires_at")
            .map_err(|e| RepositoryError::Query(e.to_string()))?;
        let username: Option<String> = row
            .try_get("username")
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(Some(Session {
            user: SessionUser {
                id: UserId(parse_uuid(&user_id, "user id")?),
                username,
            },
            expires_at: expires_at.as_deref().map(parse_datetime).transpose()?,
        }))
    }
}
