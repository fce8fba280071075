use thiserror::Error;

/// Errors surfaced by conversation and user operations.
///
/// Every service operation returns `Result<T, ConversationError>`; store
/// failures are wrapped into `OperationFailed` and never leak storage types.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConversationError {
    #[error("Not Authorized")]
    Unauthorized,

    #[error("{0}")]
    Conflict(String),

    #[error("operation failed: {0}")]
    OperationFailed(String),

    #[error("not found")]
    NotFound,

    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl ConversationError {
    /// Conflict raised when a username is already held by someone else.
    pub fn username_taken() -> Self {
        ConversationError::Conflict(USERNAME_TAKEN.to_string())
    }
}

/// Wire message for a taken username.
pub const USERNAME_TAKEN: &str = "Username already taken. Try another";

/// Errors from repository operations (used by trait definitions in huddle-core).
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database connection error")]
    Connection,

    #[error("query error: {0}")]
    Query(String),

    #[error("entity not found")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(String),
}
