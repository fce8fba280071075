//! Message handlers for the REST API.

use axum::Json;
use axum::extract::{Path, State};

use huddle_types::conversation::ConversationId;
use huddle_types::message::{Message, SendMessageRequest};

use crate::http::error::AppError;
use crate::http::extractors::auth::RequestContext;
use crate::http::response::{ApiResponse, RequestTimer};
use crate::state::AppState;

fn parse_conversation_id(raw: &str) -> Result<ConversationId, AppError> {
    raw.parse()
        .map_err(|_| AppError::Validation(format!("invalid conversation id '{raw}'")))
}

/// POST /api/v1/conversations/{id}/messages - Post a message.
pub async fn send_message(
    State(state): State<AppState>,
    RequestContext(ctx): RequestContext,
    Path(id): Path<String>,
    Json(body): Json<SendMessageRequest>,
) -> Result<Json<ApiResponse<Message>>, AppError> {
    let timer = RequestTimer::start();
    let conversation_id = parse_conversation_id(&id)?;

    let message = state
        .conversation_service
        .send_message(&ctx, &conversation_id, &body.body)
        .await?;
    Ok(Json(timer.finish(message)))
}

/// GET /api/v1/conversations/{id}/messages - Messages, oldest first.
pub async fn list_messages(
    State(state): State<AppState>,
    RequestContext(ctx): RequestContext,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<Vec<Message>>>, AppError> {
    let timer = RequestTimer::start();
    let conversation_id = parse_conversation_id(&id)?;

    let messages = state
        .conversation_service
        .list_messages(&ctx, &conversation_id)
        .await?;
    Ok(Json(timer.finish(messages)))
}
