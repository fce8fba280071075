//! Session context extractor.
//!
//! Reads an opaque bearer token from `Authorization: Bearer <token>` and
//! resolves it through the session store. Requests without a valid session
//! are not rejected here; they carry an anonymous context and each service
//! operation decides whether a session is required.

use std::convert::Infallible;

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;

use huddle_core::session::resolve_request;
use huddle_types::session::SessionContext;

use crate::state::AppState;

/// Resolved per-request session context.
pub struct RequestContext(pub SessionContext);

impl FromRequestParts<AppState> for RequestContext {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts);
        let ctx = resolve_request(state.sessions.as_ref(), token).await;
        Ok(RequestContext(ctx))
    }
}

/// Extract the bearer token from the `Authorization` header.
fn bearer_token(parts: &Parts) -> Option<&str> {
    let value = parts.headers.get(AUTHORIZATION)?.to_str().ok()?;
    value.strip_prefix("Bearer ")
}
