//! User handlers for the REST API.

use axum::Json;
use axum::extract::{Query, State};

use huddle_types::user::{CreateUsernameRequest, CreateUsernameResponse, SearchedUser};

use crate::http::error::AppError;
use crate::http::extractors::auth::RequestContext;
use crate::http::extractors::query::UserSearchQuery;
use crate::http::response::{ApiResponse, RequestTimer};
use crate::state::AppState;

/// POST /api/v1/users/username - Claim a username for the caller.
///
/// Always answers 200; failures are reported in the `error` field.
pub async fn create_username(
    State(state): State<AppState>,
    RequestContext(ctx): RequestContext,
    Json(body): Json<CreateUsernameRequest>,
) -> Json<ApiResponse<CreateUsernameResponse>> {
    let timer = RequestTimer::start();
    let result = match state.user_service.create_username(&ctx, &body.username).await {
        Ok(()) => CreateUsernameResponse::ok(),
        Err(err) => CreateUsernameResponse::failed(err.to_string()),
    };
    Json(timer.finish(result))
}

/// GET /api/v1/users/search?username= - Find users by username substring.
pub async fn search_users(
    State(state): State<AppState>,
    RequestContext(ctx): RequestContext,
    Query(query): Query<UserSearchQuery>,
) -> Result<Json<ApiResponse<Vec<SearchedUser>>>, AppError> {
    let timer = RequestTimer::start();
    let users = state.user_service.search_users(&ctx, &query.username).await?;
    Ok(Json(timer.finish(users)))
}
