//! API middleware.

#![allow(missing_docs)]

use axum::{
    body::Body,
    extract::State,
    http::{Request, header::AUTHORIZATION},
    middleware::Next,
    response::Response,
};
use pulse_core::{
    CommentService, FollowingService, MessagingService, NotificationService, OtpService,
    PostService, StoryService, TokenService, UserService,
};
use tracing::debug;

use crate::streaming::StreamingState;

/// Application state.
#[derive(Clone)]
pub struct AppState {
    pub user_service: UserService,
    pub otp_service: OtpService,
    pub following_service: FollowingService,
    pub post_service: PostService,
    pub comment_service: CommentService,
    pub story_service: StoryService,
    pub messaging_service: MessagingService,
    pub notification_service: NotificationService,
    pub tokens: TokenService,
    pub streaming: StreamingState,
}

/// Authentication middleware.
///
/// A valid bearer token puts its claims into the request extensions. Routes
/// that need a caller reject the request later through [`crate::extractors::AuthUser`].
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let token = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::to_string);

    if let Some(token) = token {
        match state.tokens.verify(&token) {
            Ok(claims) => {
                req.extensions_mut().insert(claims);
            }
            Err(e) => debug!(error = %e, "Rejected bearer token"),
        }
    }

    next.run(req).await
}
