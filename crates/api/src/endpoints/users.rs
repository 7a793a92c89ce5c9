//! Social graph and user lookup endpoints.

use axum::{
    Router,
    extract::State,
    routing::{get, post},
};
use pulse_common::AppResult;
use serde::Deserialize;

use crate::{
    extractors::{AuthUser, Json, Path, Query},
    middleware::AppState,
    response::{MessageResponse, ProfileResponse, UserSummary},
};

/// Follow or unfollow request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowRequest {
    #[serde(default)]
    pub user_id: String,
}

/// Follow a user.
async fn follow(
    user: AuthUser,
    State(state): State<AppState>,
    Json(req): Json<FollowRequest>,
) -> AppResult<Json<MessageResponse>> {
    state.following_service.follow(&user.id, &req.user_id).await?;
    Ok(Json(MessageResponse::new("Followed successfully")))
}

/// Unfollow a user.
async fn unfollow(
    user: AuthUser,
    State(state): State<AppState>,
    Json(req): Json<FollowRequest>,
) -> AppResult<Json<MessageResponse>> {
    state
        .following_service
        .unfollow(&user.id, &req.user_id)
        .await?;
    Ok(Json(MessageResponse::new("Unfollowed successfully")))
}

/// Public profile of any user.
async fn show(
    _user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<ProfileResponse>> {
    let profile = state.user_service.get_profile(&id).await?;
    Ok(Json(ProfileResponse::public(profile)))
}

async fn followers(
    _user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<Vec<UserSummary>>> {
    let users = state.user_service.followers(&id).await?;
    Ok(Json(users.iter().map(UserSummary::from).collect()))
}

async fn following(
    _user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<Vec<UserSummary>>> {
    let users = state.user_service.following(&id).await?;
    Ok(Json(users.iter().map(UserSummary::from).collect()))
}

/// Users the caller does not follow yet.
async fn suggestions(
    user: AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<Vec<UserSummary>>> {
    let users = state.user_service.suggestions(&user.id).await?;
    Ok(Json(users.iter().map(UserSummary::from).collect()))
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub query: String,
}

async fn search(
    _user: AuthUser,
    State(state): State<AppState>,
    Query(params): Query<SearchQuery>,
) -> AppResult<Json<Vec<UserSummary>>> {
    let users = state.user_service.search(&params.query).await?;
    Ok(Json(users.iter().map(UserSummary::from).collect()))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/follow", post(follow))
        .route("/unfollow", post(unfollow))
        .route("/user/{id}", get(show))
        .route("/user/{id}/followers", get(followers))
        .route("/user/{id}/following", get(following))
        .route("/users-not-followed", get(suggestions))
        .route("/users/search", get(search))
}
