//! Post, reel, like, save and comment endpoints.

use axum::{
    Router,
    extract::State,
    routing::{get, post},
};
use pulse_common::AppResult;
use pulse_core::{AddCommentInput, CreatePostInput, FeedQuery, LikeState};
use pulse_db::entities::post::PostKind;
use serde::{Deserialize, Serialize};

use crate::{
    extractors::{AuthUser, Json, Path, Query},
    middleware::AppState,
    response::{CommentResponse, Created, MessageResponse, PostResponse},
};

/// Feed filters.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedParams {
    pub author: Option<String>,
    pub post_type: Option<PostKind>,
}

async fn feed(
    user: AuthUser,
    State(state): State<AppState>,
    Query(params): Query<FeedParams>,
) -> AppResult<Json<Vec<PostResponse>>> {
    let query = FeedQuery {
        author_id: params.author,
        kind: params.post_type,
    };
    let posts = state.post_service.feed(&user.id, query).await?;
    Ok(Json(posts.into_iter().map(Into::into).collect()))
}

#[derive(Debug, Deserialize)]
pub struct ReelsParams {
    #[serde(default = "default_page")]
    pub page: u64,
    #[serde(default = "default_reels_limit")]
    pub limit: u64,
}

const fn default_page() -> u64 {
    1
}

const fn default_reels_limit() -> u64 {
    10
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: u64,
    pub limit: u64,
    pub total: u64,
    pub has_more: bool,
}

#[derive(Serialize)]
pub struct ReelsResponse {
    pub reels: Vec<PostResponse>,
    pub pagination: Pagination,
}

async fn reels(
    user: AuthUser,
    State(state): State<AppState>,
    Query(params): Query<ReelsParams>,
) -> AppResult<Json<ReelsResponse>> {
    let page = state
        .post_service
        .reels(&user.id, params.page, params.limit)
        .await?;

    Ok(Json(ReelsResponse {
        pagination: Pagination {
            page: page.page,
            limit: page.limit,
            total: page.total,
            has_more: page.has_more,
        },
        reels: page.items.into_iter().map(Into::into).collect(),
    }))
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub query: String,
    #[serde(rename = "type")]
    pub kind: Option<PostKind>,
}

async fn search(
    user: AuthUser,
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> AppResult<Json<Vec<PostResponse>>> {
    let posts = state
        .post_service
        .search(&user.id, &params.query, params.kind)
        .await?;
    Ok(Json(posts.into_iter().map(Into::into).collect()))
}

async fn saved(user: AuthUser, State(state): State<AppState>) -> AppResult<Json<Vec<PostResponse>>> {
    let posts = state.post_service.saved(&user.id).await?;
    Ok(Json(posts.into_iter().map(Into::into).collect()))
}

async fn show(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<PostResponse>> {
    let post = state.post_service.get(&user.id, &id).await?;
    Ok(Json(post.into()))
}

async fn create(
    user: AuthUser,
    State(state): State<AppState>,
    Json(input): Json<CreatePostInput>,
) -> AppResult<Created<PostResponse>> {
    let post = state.post_service.create(&user.id, input).await?;
    Ok(Created(post.into()))
}

async fn delete(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<MessageResponse>> {
    state.post_service.delete(&user.id, &id).await?;
    Ok(Json(MessageResponse::new("Post deleted successfully")))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LikeResponse {
    pub likes: Vec<String>,
    pub is_liked: bool,
}

impl From<LikeState> for LikeResponse {
    fn from(state: LikeState) -> Self {
        Self {
            likes: state.likes,
            is_liked: state.is_liked,
        }
    }
}

async fn toggle_like(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<LikeResponse>> {
    let likes = state.post_service.toggle_like(&user.id, &id).await?;
    Ok(Json(likes.into()))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveResponse {
    pub is_saved: bool,
}

async fn toggle_save(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<SaveResponse>> {
    let is_saved = state.post_service.toggle_save(&user.id, &id).await?;
    Ok(Json(SaveResponse { is_saved }))
}

async fn comments(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<Vec<CommentResponse>>> {
    let tree = state.comment_service.list(&user.id, &id).await?;
    Ok(Json(tree.into_iter().map(Into::into).collect()))
}

async fn add_comment(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(input): Json<AddCommentInput>,
) -> AppResult<Created<CommentResponse>> {
    let comment = state.comment_service.add(&user.id, &id, input).await?;
    Ok(Created(comment.into()))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(feed).post(create))
        .route("/reels", get(reels))
        .route("/search", get(search))
        .route("/saved", get(saved))
        .route("/{id}", get(show).delete(delete))
        .route("/{id}/like", post(toggle_like))
        .route("/{id}/save", post(toggle_save))
        .route("/{id}/comments", get(comments).post(add_comment))
}
