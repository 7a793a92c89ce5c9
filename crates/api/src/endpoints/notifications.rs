//! Notifications endpoints.

use axum::{
    Router,
    extract::State,
    routing::{get, put},
};
use pulse_common::AppResult;
use pulse_core::{CreateNotificationInput, NotificationDetail};
use pulse_db::entities::notification::NotificationKind;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::{
    extractors::{AuthUser, Json, Path},
    middleware::AppState,
    response::{CountResponse, Created, NotificationResponse},
};

/// Latest notifications of the caller.
async fn list(
    user: AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<Vec<NotificationResponse>>> {
    let notifications = state.notification_service.list(&user.id).await?;
    Ok(Json(notifications.into_iter().map(Into::into).collect()))
}

async fn unread_count(
    user: AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<CountResponse>> {
    let count = state.notification_service.count_unread(&user.id).await?;
    Ok(Json(CountResponse { count }))
}

async fn mark_as_read(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<NotificationResponse>> {
    let notification = state
        .notification_service
        .mark_as_read(&user.id, &id)
        .await?;
    Ok(Json(
        NotificationDetail {
            notification,
            actor: None,
        }
        .into(),
    ))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkAllResponse {
    pub message: String,
    pub updated_count: u64,
}

async fn mark_all_as_read(
    user: AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<MarkAllResponse>> {
    let updated_count = state.notification_service.mark_all_as_read(&user.id).await?;
    Ok(Json(MarkAllResponse {
        message: "All notifications marked as read".to_string(),
        updated_count,
    }))
}

/// Manual notification request; the caller becomes the actor.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateNotificationRequest {
    #[validate(length(min = 1))]
    pub user_id: String,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    #[validate(length(min = 1, max = 500))]
    pub message: String,
    pub post_id: Option<String>,
}

async fn create(
    user: AuthUser,
    State(state): State<AppState>,
    Json(req): Json<CreateNotificationRequest>,
) -> AppResult<Created<NotificationResponse>> {
    req.validate()?;

    let notification = state
        .notification_service
        .create_manual(
            &user.id,
            CreateNotificationInput {
                recipient_id: req.user_id,
                kind: req.kind,
                message: req.message,
                post_id: req.post_id,
            },
        )
        .await?;

    Ok(Created(
        NotificationDetail {
            notification,
            actor: None,
        }
        .into(),
    ))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteAllResponse {
    pub deleted_count: u64,
}

async fn delete_all(
    user: AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<DeleteAllResponse>> {
    let deleted_count = state.notification_service.delete_all(&user.id).await?;
    Ok(Json(DeleteAllResponse { deleted_count }))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create).delete(delete_all))
        .route("/unread-count", get(unread_count))
        .route("/mark-all-read", put(mark_all_as_read))
        .route("/{id}/read", put(mark_as_read))
}
