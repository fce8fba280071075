//! User repository trait definition.

use huddle_types::error::RepositoryError;
use huddle_types::user::{SearchedUser, User, UserId};

/// Repository trait for user persistence.
pub trait UserRepository: Send + Sync {
    /// Insert a new user.
    fn create(
        &self,
        user: &User,
    ) -> impl std::future::Future<Output = Result<User, RepositoryError>> + Send;

    fn get_by_id(
        &self,
        id: &UserId,
    ) -> impl std::future::Future<Output = Result<Option<User>, RepositoryError>> + Send;

    /// Exact username lookup.
    fn find_by_username(
        &self,
        username: &str,
    ) -> impl std::future::Future<Output = Result<Option<User>, RepositoryError>> + Send;

    /// Set a user's username.
    ///
    /// Must return `RepositoryError::Conflict` when the store's uniqueness
    /// constraint rejects the write, and `NotFound` for an unknown user.
    fn update_username(
        &self,
        id: &UserId,
        username: &str,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Case-insensitive substring search on username, excluding one user.
    fn search(
        &self,
        query: &str,
        exclude: &UserId,
        limit: i64,
    ) -> impl std::future::Future<Output = Result<Vec<SearchedUser>, RepositoryError>> + Send;
}
