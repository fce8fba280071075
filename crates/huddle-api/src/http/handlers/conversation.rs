//! Conversation handlers for the REST API.

use axum::Json;
use axum::extract::State;

use huddle_types::conversation::{
    Conversation, CreateConversationRequest, CreateConversationResponse,
};

use crate::http::error::AppError;
use crate::http::extractors::auth::RequestContext;
use crate::http::response::{ApiResponse, RequestTimer};
use crate::state::AppState;

/// GET /api/v1/conversations - Conversations the caller participates in.
pub async fn list_conversations(
    State(state): State<AppState>,
    RequestContext(ctx): RequestContext,
) -> Result<Json<ApiResponse<Vec<Conversation>>>, AppError> {
    let timer = RequestTimer::start();
    let conversations = state.conversation_service.list_conversations(&ctx).await?;
    Ok(Json(timer.finish(conversations)))
}

/// POST /api/v1/conversations - Create a conversation with the given participants.
pub async fn create_conversation(
    State(state): State<AppState>,
    RequestContext(ctx): RequestContext,
    Json(body): Json<CreateConversationRequest>,
) -> Result<Json<ApiResponse<CreateConversationResponse>>, AppError> {
    let timer = RequestTimer::start();
    let created = state
        .conversation_service
        .create_conversation(&ctx, &body.participant_ids)
        .await?;
    Ok(Json(timer.finish(created)))
}
