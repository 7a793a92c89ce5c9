//! Direct messaging endpoints.

use axum::{
    Router,
    extract::State,
    routing::{get, post, put},
};
use pulse_common::AppResult;
use pulse_core::{DirectMessageInput, SendMessageInput};
use serde::{Deserialize, Serialize};

use crate::{
    extractors::{AuthUser, Json, Path},
    middleware::AppState,
    response::{ChatMessageResponse, ConversationResponse, CountResponse, Created},
};

/// Conversations of the caller, most recent activity first.
async fn conversations(
    user: AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<Vec<ConversationResponse>>> {
    let conversations = state.messaging_service.conversations(&user.id).await?;
    Ok(Json(conversations.into_iter().map(Into::into).collect()))
}

/// Number of conversations with unread messages.
async fn unread_count(
    user: AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<CountResponse>> {
    let count = state.messaging_service.unread_count(&user.id).await?;
    Ok(Json(CountResponse { count }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetOrCreateRequest {
    pub other_user_id: String,
}

async fn get_or_create(
    user: AuthUser,
    State(state): State<AppState>,
    Json(req): Json<GetOrCreateRequest>,
) -> AppResult<Created<ConversationResponse>> {
    let conversation = state
        .messaging_service
        .get_or_create(&user.id, &req.other_user_id)
        .await?;
    Ok(Created(conversation.into()))
}

async fn messages(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<Vec<ChatMessageResponse>>> {
    let messages = state.messaging_service.messages(&user.id, &id).await?;
    Ok(Json(messages.iter().map(Into::into).collect()))
}

async fn send(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(input): Json<SendMessageInput>,
) -> AppResult<Created<ChatMessageResponse>> {
    let message = state.messaging_service.send(&user.id, &id, input).await?;
    Ok(Created((&message).into()))
}

/// Message a user directly, opening a conversation if needed.
async fn send_direct(
    user: AuthUser,
    State(state): State<AppState>,
    Json(input): Json<DirectMessageInput>,
) -> AppResult<Created<ChatMessageResponse>> {
    let message = state.messaging_service.send_to_user(&user.id, input).await?;
    Ok(Created((&message).into()))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkReadResponse {
    pub message: String,
    pub updated_count: u64,
}

async fn mark_read(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<MarkReadResponse>> {
    let updated_count = state.messaging_service.mark_read(&user.id, &id).await?;
    Ok(Json(MarkReadResponse {
        message: "Messages marked as read".to_string(),
        updated_count,
    }))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/conversations", get(conversations))
        .route("/unread-count", get(unread_count))
        .route("/conversations/get-or-create", post(get_or_create))
        .route("/conversations/{id}/messages", get(messages).post(send))
        .route("/conversations/{id}/mark-read", put(mark_read))
        .route("/messages", post(send_direct))
}
