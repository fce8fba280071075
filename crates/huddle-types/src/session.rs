//! Session types shared by the HTTP and WebSocket transports.
//!
//! A `Session` is issued by an external identity provider. The core never
//! persists it; it only lives in request or connection scope inside a
//! [`SessionContext`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ConversationError;
use crate::user::UserId;

/// The user a session belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionUser {
    pub id: UserId,
    #[serde(default)]
    pub username: Option<String>,
}

/// An opaque, externally issued session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub user: SessionUser,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

impl Session {
    pub fn new(user: SessionUser) -> Self {
        Self {
            user,
            expires_at: None,
        }
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|exp| exp <= now)
    }
}

/// Per-call authentication state threaded through every operation.
///
/// `session: None` means unauthenticated. Operations that need a user call
/// [`SessionContext::require_user`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionContext {
    pub session: Option<Session>,
}

impl SessionContext {
    pub fn authenticated(session: Session) -> Self {
        Self {
            session: Some(session),
        }
    }

    pub fn anonymous() -> Self {
        Self { session: None }
    }

    pub fn is_authenticated(&self) -> bool {
        self.session.is_some()
    }

    pub fn user(&self) -> Option<&SessionUser> {
        self.session.as_ref().map(|s| &s.user)
    }

    /// Return the session user or fail with `Unauthorized`.
    pub fn require_user(&self) -> Result<&SessionUser, ConversationError> {
        self.user().ok_or(ConversationError::Unauthorized)
    }
}
