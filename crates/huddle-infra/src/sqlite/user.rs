//! SQLite user repository implementation.
//!
//! Username uniqueness is enforced by the `users.username` UNIQUE index;
//! violations surface as `RepositoryError::Conflict`.

use huddle_core::repository::user::UserRepository;
use huddle_types::error::RepositoryError;
use huddle_types::user::{SearchedUser, User, UserId};
use sqlx::Row;

use super::pool::DatabasePool;
use super::{format_datetime, is_unique_violation, parse_datetime, parse_uuid};

/// SQLite-backed implementation of `UserRepository`.
pub struct SqliteUserRepository {
    pool: DatabasePool,
}

impl SqliteUserRepository {
    /// Create a new repository backed by the given database pool.
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

/// Internal row type for mapping SQLite rows to domain User.
struct UserRow {
    id: String,
    username: Option<String>,
    name: Option<String>,
    email: Option<String>,
    created_at: String,
}

impl UserRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            username: row.try_get("username")?,
            name: row.try_get("name")?,
            email: row.try_get("email")?,
            created_at: row.try_get("created_at")?,
        })
    }

    fn into_user(self) -> Result<User, RepositoryError> {
        Ok(User {
            id: UserId(parse_uuid(&self.id, "user id")?),
            username: self.username,
            name: self.name,
            email: self.email,
            created_at: parse_datetime(&self.created_at)?,
        })
    }
}

fn map_user_row(row: Option<sqlx::sqlite::SqliteRow>) -> Result<Option<User>, RepositoryError> {
    match row {
        Some(row) => {
            let user_row =
                UserRow::from_row(&row).map_err(|e| RepositoryError::Query(e.to_string()))?;
            Ok(Some(user_row.into_user()?))
        }
        None => Ok(None),
    }
}

impl UserRepository for SqliteUserRepository {
    async fn create(&self, user: &User) -> Result<User, RepositoryError> {
        let result = sqlx::query(
            "INSERT INTO users (id, username, name, email, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(user.id.to_string())
        .bind(&user.username)
        .bind(&user.name)
        .bind(&user.email)
        .bind(format_datetime(&user.created_at))
        .execute(&self.pool.writer)
        .await;

        match result {
            Ok(_) => Ok(user.clone()),
            Err(e) if is_unique_violation(&e) => Err(RepositoryError::Conflict(
                "a user with this email or username already exists".to_string(),
            )),
            Err(e) => Err(RepositoryError::Query(e.to_string())),
        }
    }

    async fn get_by_id(&self, id: &UserId) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM users WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;
        map_user_row(row)
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM users WHERE username = ?")
            .bind(username)
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;
        map_user_row(row)
    }

    async fn update_username(&self, id: &UserId, username: &str) -> Result<(), RepositoryError> {
        let result = sqlx::query("UPDATE users SET username = ? WHERE id = ?")
            .bind(username)
            .bind(id.to_string())
            .execute(&self.pool.writer)
            .await;

        match result {
            Ok(done) if done.rows_affected() == 0 => Err(RepositoryError::NotFound),
            Ok(_) => Ok(()),
            Err(e) if is_unique_violation(&e) => Err(RepositoryError::Conflict(format!(
                "username '{username}' already exists"
            ))),
            Err(e) => Err(RepositoryError::Query(e.to_string())),
        }
    }

    async fn search(
        &self,
        query: &str,
        exclude: &UserId,
        limit: i64,
    ) -> Result<Vec<SearchedUser>, RepositoryError> {
        // instr() keeps `%` and `_` in the query literal.
        let rows = sqlx::query(
            "SELECT id, username FROM users
             WHERE username IS NOT NULL
               AND id != ?
               AND instr(lower(username), lower(?)) > 0
             ORDER BY username ASC
             LIMIT ?",
        )
        .bind(exclude.to_string())
        .bind(query)
        .bind(limit)
        .fetch_all(&self.pool.reader)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        rows.iter()
            .map(|row| {
                let id: String = row
                    .try_get("id")
                    .map_err(|e| RepositoryError::Query(e.to_string()))?;
                let username: String = row
                    .try_get("username")
                    .map_err(|e| RepositoryError::Query(e.to_string()))?;
                Ok(SearchedUser {
                    id: UserId(parse_uuid(&id, "user id")?),
                    username,
                })
            })
            .collect()
    }
}
