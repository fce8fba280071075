//! Derive a uniform [`SessionContext`] from either transport.
//!
//! The request path asks an [`IdentityProvider`] which session a bearer token
//! belongs to. The stream path trusts the session blob the client echoes in
//! its `connection_init` payload: no lookup or signature check happens there,
//! the client is expected to have obtained it through the request path.
//!
//! Both paths degrade to an unauthenticated context instead of failing;
//! operations that need a user reject it themselves.

use chrono::Utc;
use huddle_types::error::RepositoryError;
use huddle_types::session::{Session, SessionContext};
use tracing::{debug, warn};

/// External collaborator that knows which session a credential maps to.
pub trait IdentityProvider: Send + Sync {
    /// Look up the session bound to an opaque bearer token.
    fn session_for_token(
        &self,
        token: &str,
    ) -> impl std::future::Future<Output = Result<Option<Session>, RepositoryError>> + Send;
}

/// Resolve the context of an HTTP request from its bearer token.
///
/// Missing, unknown, or expired tokens and provider failures all yield an
/// anonymous context.
pub async fn resolve_request<P: IdentityProvider>(
    provider: &P,
    bearer: Option<&str>,
) -> SessionContext {
    let Some(token) = bearer.map(str::trim).filter(|t| !t.is_empty()) else {
        return SessionContext::anonymous();
    };

    match provider.session_for_token(token).await {
        Ok(Some(session)) if session.is_expired_at(Utc::now()) => {
            debug!(user_id = %session.user.id, "session expired");
            SessionContext::anonymous()
        }
        Ok(Some(session)) => SessionContext::authenticated(session),
        Ok(None) => SessionContext::anonymous(),
        Err(err) => {
            warn!(error = %err, "identity provider lookup failed");
            SessionContext::anonymous()
        }
    }
}

/// Resolve the context of a WebSocket connection from its handshake payload.
///
/// Reads `payload.session`. A missing or malformed blob yields an anonymous
/// context.
pub fn resolve_handshake(payload: Option<&serde_json::Value>) -> SessionContext {
    let Some(blob) = payload.and_then(|p| p.get("session")) else {
        return SessionContext::anonymous();
    };
    if blob.is_null() {
        return SessionContext::anonymous();
    }

    match serde_json::from_value::<Session>(blob.clone()) {
        Ok(session) => SessionContext::authenticated(session),
        Err(err) => {
            debug!(error = %err, "ignoring malformed handshake session");
            SessionContext::anonymous()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use huddle_types::session::SessionUser;
    use huddle_types::user::UserId;
    use serde_json::json;
    use std::collections::HashMap;

    struct MockProvider {
        sessions: HashMap<String, Session>,
        fail: bool,
    }

    impl MockProvider {
        fn with(token: &str, session: Session) -> Self {
            let mut sessions = HashMap::new();
            sessions.insert(token.to_string(), session);
            Self {
                sessions,
                fail: false,
            }
        }

        fn failing() -> Self {
            Self {
                sessions: HashMap::new(),
                fail: true,
            }
        }
    }

    impl IdentityProvider for MockProvider {
        async fn session_for_token(&self, token: &str) -> Result<Option<Session>, RepositoryError> {
            if self.fail {
                return Err(RepositoryError::Connection);
            }
            Ok(self.sessions.get(token).cloned())
        }
    }

    fn session() -> Session {
        Session::new(SessionUser {
            id: UserId::new(),
            username: Some("ada".to_string()),
        })
    }

    #[tokio::test]
    async fn request_with_known_token_is_authenticated() {
        let s = session();
        let provider = MockProvider::with("tok", s.clone());
        let ctx = resolve_request(&provider, Some("tok")).await;
        assert_eq!(ctx.session, Some(s));
    }

    #[tokio::test]
    async fn request_without_token_is_anonymous() {
        let provider = MockProvider::with("tok", session());
        assert!(!resolve_request(&provider, None).await.is_authenticated());
        assert!(!resolve_request(&provider, Some("  ")).await.is_authenticated());
    }

    #[tokio::test]
    async fn request_with_unknown_token_is_anonymous() {
        let provider = MockProvider::with("tok", session());
        let ctx = resolve_request(&provider, Some("other")).await;
        assert!(!ctx.is_authenticated());
    }

    #[tokio::test]
    async fn request_with_expired_session_is_anonymous() {
        let mut s = session();
        s.expires_at = Some(Utc::now() - Duration::minutes(1));
        let provider = MockProvider::with("tok", s);
        let ctx = resolve_request(&provider, Some("tok")).await;
        assert!(!ctx.is_authenticated());
    }

    #[tokio::test]
    async fn provider_failure_is_anonymous() {
        let ctx = resolve_request(&MockProvider::failing(), Some("tok")).await;
        assert!(!ctx.is_authenticated());
    }

    #[test]
    fn handshake_with_session_blob_is_trusted() {
        let id = UserId::new();
        let payload = json!({ "session": { "user": { "id": id.to_string(), "username": "ada" } } });
        let ctx = resolve_handshake(Some(&payload));
        let user = ctx.require_user().unwrap();
        assert_eq!(user.id, id);
        assert_eq!(user.username.as_deref(), Some("ada"));
    }

    #[test]
    fn handshake_without_session_is_anonymous() {
        assert!(!resolve_handshake(None).is_authenticated());
        assert!(!resolve_handshake(Some(&json!({}))).is_authenticated());
        assert!(!resolve_handshake(Some(&json!({ "session": null }))).is_authenticated());
    }

    #[test]
    fn handshake_with_malformed_session_is_anonymous() {
        let payload = json!({ "session": { "user": { "id": "not-a-uuid" } } });
        assert!(!resolve_handshake(Some(&payload)).is_authenticated());
    }
}
