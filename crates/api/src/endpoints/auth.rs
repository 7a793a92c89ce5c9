//! Account endpoints: registration, login, profile, password, privacy and email OTP.

use axum::{
    Router,
    extract::State,
    routing::{get, post, put},
};
use pulse_common::AppResult;
use pulse_core::{
    ChangePasswordInput, LoginInput, LoginWithOtpInput, PrivacySettings, RegisterInput,
    SendLoginOtpInput, UpdatePrivacyInput, UpdateProfileInput, VerifyEmailInput,
};
use serde::Serialize;

use crate::{
    extractors::{AuthUser, Json},
    middleware::AppState,
    response::{AccountResponse, AuthResponse, Created, MessageResponse, ProfileResponse},
};

/// Register a new account.
async fn register(
    State(state): State<AppState>,
    Json(input): Json<RegisterInput>,
) -> AppResult<Created<AuthResponse>> {
    let session = state.user_service.register(input).await?;
    Ok(Created(session.into()))
}

/// Sign in with email and password.
async fn login(
    State(state): State<AppState>,
    Json(input): Json<LoginInput>,
) -> AppResult<Json<AuthResponse>> {
    let session = state.user_service.login(input).await?;
    Ok(Json(session.into()))
}

/// Current user's profile.
async fn me(user: AuthUser, State(state): State<AppState>) -> AppResult<Json<ProfileResponse>> {
    let profile = state.user_service.get_profile(&user.id).await?;
    Ok(Json(ProfileResponse::own(profile)))
}

async fn update_me(
    user: AuthUser,
    State(state): State<AppState>,
    Json(input): Json<UpdateProfileInput>,
) -> AppResult<Json<ProfileResponse>> {
    state.user_service.update_profile(&user.id, input).await?;
    let profile = state.user_service.get_profile(&user.id).await?;
    Ok(Json(ProfileResponse::own(profile)))
}

async fn change_password(
    user: AuthUser,
    State(state): State<AppState>,
    Json(input): Json<ChangePasswordInput>,
) -> AppResult<Json<MessageResponse>> {
    state.user_service.change_password(&user.id, input).await?;
    Ok(Json(MessageResponse::new("Password updated successfully")))
}

async fn get_privacy(
    user: AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<PrivacySettings>> {
    Ok(Json(state.user_service.get_privacy(&user.id).await?))
}

async fn update_privacy(
    user: AuthUser,
    State(state): State<AppState>,
    Json(input): Json<UpdatePrivacyInput>,
) -> AppResult<Json<PrivacySettings>> {
    Ok(Json(state.user_service.update_privacy(&user.id, input).await?))
}

/// Mail a verification code to the caller.
async fn send_verification_otp(
    user: AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<MessageResponse>> {
    state.otp_service.send_verification_otp(&user.id).await?;
    Ok(Json(MessageResponse::new("OTP sent to your email")))
}

#[derive(Serialize)]
struct VerifiedResponse {
    message: String,
    user: AccountResponse,
}

async fn verify_email(
    user: AuthUser,
    State(state): State<AppState>,
    Json(input): Json<VerifyEmailInput>,
) -> AppResult<Json<VerifiedResponse>> {
    let verified = state.otp_service.verify_email(&user.id, input).await?;
    Ok(Json(VerifiedResponse {
        message: "Email verified successfully".to_string(),
        user: (&verified).into(),
    }))
}

async fn send_login_otp(
    State(state): State<AppState>,
    Json(input): Json<SendLoginOtpInput>,
) -> AppResult<Json<MessageResponse>> {
    state.otp_service.send_login_otp(input).await?;
    Ok(Json(MessageResponse::new("OTP sent to your email")))
}

async fn login_with_otp(
    State(state): State<AppState>,
    Json(input): Json<LoginWithOtpInput>,
) -> AppResult<Json<AuthResponse>> {
    let session = state.otp_service.login_with_otp(input).await?;
    Ok(Json(session.into()))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/me", get(me).put(update_me))
        .route("/change-password", put(change_password))
        .route("/privacy-settings", get(get_privacy).put(update_privacy))
        .route("/send-verification-otp", post(send_verification_otp))
        .route("/verify-email", post(verify_email))
        .route("/send-login-otp", post(send_login_otp))
        .route("/login-with-otp", post(login_with_otp))
}
