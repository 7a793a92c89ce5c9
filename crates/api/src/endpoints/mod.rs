//! API endpoints.

mod auth;
mod chat;
mod notifications;
mod posts;
mod stories;
mod users;

use axum::{Json, Router};

use crate::{middleware::AppState, response::MessageResponse};

/// Create the API router.
///
/// Account and social graph routes share the `/auth` prefix.
pub fn router() -> Router<AppState> {
    Router::new()
        .nest("/auth", auth::router().merge(users::router()))
        .nest("/posts", posts::router())
        .nest("/stories", stories::router())
        .nest("/chat", chat::router())
        .nest("/notifications", notifications::router())
}

/// Health check.
pub async fn health() -> Json<MessageResponse> {
    Json(MessageResponse::new("Pulse API is running"))
}
