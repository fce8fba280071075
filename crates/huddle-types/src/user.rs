//! User identity types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use std::fmt;
use std::str::FromStr;

/// Unique identifier for a user, wrapping a UUID v7 (time-sortable).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub Uuid);

impl UserId {
    /// Create a new UserId using UUID v7.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Create a UserId from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for UserId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// A registered user.
///
/// Users are created by the identity flow (or `huddle user create` locally).
/// The username starts out unset and is chosen once through `createUsername`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    /// Globally unique handle. `None` until the user picks one.
    pub username: Option<String>,
    pub name: Option<String>,
    pub email: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Build a fresh user with no username.
    pub fn new(email: Option<String>, name: Option<String>) -> Self {
        Self {
            id: UserId::new(),
            username: None,
            name,
            email,
            created_at: Utc::now(),
        }
    }
}

/// Lightweight user projection returned by user search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchedUser {
    pub id: UserId,
    pub username: String,
}

/// Request body for `createUsername`.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateUsernameRequest {
    pub username: String,
}

/// Result of `createUsername`. Failures travel in `error` rather than as a
/// transport-level error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateUsernameResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CreateUsernameResponse {
    pub fn ok() -> Self {
        Self {
            success: Some(true),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: None,
            error: Some(error.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_username_response_shapes() {
        assert_eq!(
            serde_json::to_value(CreateUsernameResponse::ok()).unwrap(),
            serde_json::json!({ "success": true })
        );
        assert_eq!(
            serde_json::to_value(CreateUsernameResponse::failed("Not Authorized")).unwrap(),
            serde_json::json!({ "error": "Not Authorized" })
        );
    }

    #[test]
    fn test_user_id_roundtrip() {
        let id = UserId::new();
        let parsed: UserId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn test_user_id_serializes_as_plain_string() {
        let id = UserId::new();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{id}\""));
    }

    #[test]
    fn test_new_user_has_no_username() {
        let user = User::new(Some("ada@example.com".to_string()), None);
        assert!(user.username.is_none());
        assert_eq!(user.email.as_deref(), Some("ada@example.com"));
    }
}
