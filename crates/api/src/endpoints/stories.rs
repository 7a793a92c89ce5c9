//! Story endpoints.

use axum::{
    Router,
    extract::State,
    routing::{get, post},
};
use pulse_common::AppResult;
use pulse_core::{CreateStoryInput, ReactInput, StoryReplyInput};

use crate::{
    extractors::{AuthUser, Json, Path},
    middleware::AppState,
    response::{Created, MessageResponse, StoryReactionResponse, StoryResponse},
};

/// Stories of the caller and their mutual follows.
async fn feed(user: AuthUser, State(state): State<AppState>) -> AppResult<Json<Vec<StoryResponse>>> {
    let stories = state.story_service.feed(&user.id).await?;
    Ok(Json(stories.into_iter().map(Into::into).collect()))
}

async fn by_user(
    user: AuthUser,
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> AppResult<Json<Vec<StoryResponse>>> {
    let stories = state.story_service.by_user(&user.id, &user_id).await?;
    Ok(Json(stories.into_iter().map(Into::into).collect()))
}

async fn show(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<StoryResponse>> {
    let story = state.story_service.get(&user.id, &id).await?;
    Ok(Json(story.into()))
}

async fn create(
    user: AuthUser,
    State(state): State<AppState>,
    Json(input): Json<CreateStoryInput>,
) -> AppResult<Created<StoryResponse>> {
    let story = state.story_service.create(&user.id, input).await?;
    Ok(Created(story.into()))
}

async fn view(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<MessageResponse>> {
    state.story_service.view(&user.id, &id).await?;
    Ok(Json(MessageResponse::new("Story viewed")))
}

async fn react(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(input): Json<ReactInput>,
) -> AppResult<Json<StoryReactionResponse>> {
    let reaction = state.story_service.react(&user.id, &id, input).await?;
    Ok(Json(reaction.into()))
}

/// Reply privately to a story; the reply lands in the author's chat.
async fn reply(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(input): Json<StoryReplyInput>,
) -> AppResult<Json<MessageResponse>> {
    state.story_service.reply(&user.id, &id, input).await?;
    Ok(Json(MessageResponse::new("Reply sent to chat")))
}

async fn delete(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<MessageResponse>> {
    state.story_service.delete(&user.id, &id).await?;
    Ok(Json(MessageResponse::new("Story deleted successfully")))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(feed).post(create))
        .route("/user/{user_id}", get(by_user))
        .route("/{id}", get(show).delete(delete))
        .route("/{id}/view", post(view))
        .route("/{id}/react", post(react))
        .route("/{id}/reply", post(reply))
}
