//! User service: username selection, user search, and local registration.

use huddle_types::error::{ConversationError, RepositoryError};
use huddle_types::session::SessionContext;
use huddle_types::user::{SearchedUser, User, UserId};
use tracing::{debug, info};

use crate::repository::user::UserRepository;

/// Maximum number of users returned by a search.
pub const SEARCH_LIMIT: i64 = 20;

/// Service for user-facing identity operations.
pub struct UserService<U: UserRepository> {
    repo: U,
}

impl<U: UserRepository> UserService<U> {
    pub fn new(repo: U) -> Self {
        Self { repo }
    }

    /// Claim `username` for the caller.
    ///
    /// The availability pre-check only avoids pointless writes. The store's
    /// unique index is the authority: a constraint violation on the write is
    /// reported as the same conflict, so two racing claims cannot both win.
    pub async fn create_username(
        &self,
        ctx: &SessionContext,
        username: &str,
    ) -> Result<(), ConversationError> {
        let user = ctx.require_user()?;

        let username = username.trim();
        if username.is_empty() {
            return Err(ConversationError::InvalidInput(
                "username cannot be empty".to_string(),
            ));
        }

        let existing = self
            .repo
            .find_by_username(username)
            .await
            .map_err(|e| ConversationError::OperationFailed(e.to_string()))?;

        match existing {
            Some(owner) if owner.id == user.id => {
                debug!(user_id = %user.id, %username, "username already held by caller");
                return Ok(());
            }
            Some(_) => return Err(ConversationError::username_taken()),
            None => {}
        }

        self.repo
            .update_username(&user.id, username)
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(_) => ConversationError::username_taken(),
                RepositoryError::NotFound => ConversationError::NotFound,
                other => ConversationError::OperationFailed(other.to_string()),
            })?;

        info!(user_id = %user.id, %username, "username set");
        Ok(())
    }

    /// Users whose username contains `query`, excluding the caller.
    pub async fn search_users(
        &self,
        ctx: &SessionContext,
        query: &str,
    ) -> Result<Vec<SearchedUser>, ConversationError> {
        let user = ctx.require_user()?;

        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }

        self.repo
            .search(query, &user.id, SEARCH_LIMIT)
            .await
            .map_err(|e| ConversationError::OperationFailed(e.to_string()))
    }

    /// Register a user without a username (local development flow).
    pub async fn register_user(
        &self,
        email: Option<String>,
        name: Option<String>,
    ) -> Result<User, ConversationError> {
        let user = User::new(email, name);
        let user = self
            .repo
            .create(&user)
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(msg) => ConversationError::Conflict(msg),
                other => ConversationError::OperationFailed(other.to_string()),
            })?;
        info!(user_id = %user.id, "user registered");
        Ok(user)
    }

    pub async fn get_user(&self, id: &UserId) -> Result<User, ConversationError> {
        self.repo
            .get_by_id(id)
            .await
            .map_err(|e| ConversationError::OperationFailed(e.to_string()))?
            .ok_or(ConversationError::NotFound)
    }
}
