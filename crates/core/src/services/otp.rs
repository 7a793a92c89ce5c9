//! Email one-time codes for verification and passwordless login.

use chrono::{DateTime, Duration, Utc};
use pulse_common::{AppError, AppResult, IdGenerator};
use pulse_db::{entities::user, repositories::UserRepository};
use sea_orm::Set;
use serde::Deserialize;
use validator::Validate;

use crate::services::{
    mailer::MailerService,
    user::{AuthSession, UserService},
};

/// Input for confirming an email address.
#[derive(Debug, Deserialize, Validate)]
pub struct VerifyEmailInput {
    #[validate(length(equal = 6))]
    pub otp: String,
}

/// Input for requesting a login code.
#[derive(Debug, Deserialize, Validate)]
pub struct SendLoginOtpInput {
    #[validate(email)]
    pub email: String,
}

/// Input for signing in with a login code.
#[derive(Debug, Deserialize, Validate)]
pub struct LoginWithOtpInput {
    #[validate(email)]
    pub email: String,

    #[validate(length(equal = 6))]
    pub otp: String,
}

/// One-time code service.
#[derive(Clone)]
pub struct OtpService {
    user_repo: UserRepository,
    users: UserService,
    mailer: MailerService,
    ttl: Duration,
    id_gen: IdGenerator,
}

impl OtpService {
    /// Create a new OTP service. Codes stay valid for `ttl`.
    #[must_use]
    pub const fn new(
        user_repo: UserRepository,
        users: UserService,
        mailer: MailerService,
        ttl: Duration,
    ) -> Self {
        Self {
            user_repo,
            users,
            mailer,
            ttl,
            id_gen: IdGenerator::new(),
        }
    }

    /// Mail a verification code to the caller.
    pub async fn send_verification_otp(&self, user_id: &str) -> AppResult<()> {
        let user = self.user_repo.get_by_id(user_id).await?;
        let code = self.store_code(user.clone()).await?;

        self.deliver(
            &user,
            "Verify your Pulse email",
            &format!(
                "Your verification code is {code}. It expires in {} minutes.",
                self.ttl.num_minutes()
            ),
        )
        .await;
        Ok(())
    }

    /// Confirm the caller's email with a code.
    pub async fn verify_email(&self, user_id: &str, input: VerifyEmailInput) -> AppResult<user::Model> {
        input.validate()?;

        let user = self.user_repo.get_by_id(user_id).await?;
        check_otp(&user, &input.otp, Utc::now())?;

        let mut active: user::ActiveModel = user.into();
        active.email_verified = Set(true);
        active.otp_code = Set(None);
        active.otp_expires_at = Set(None);
        active.updated_at = Set(Some(Utc::now().into()));

        let user = self.user_repo.update(active).await?;
        tracing::info!(user_id = %user.id, "Email verified");
        Ok(user)
    }

    /// Mail a login code to the account owning `email`.
    pub async fn send_login_otp(&self, input: SendLoginOtpInput) -> AppResult<()> {
        input.validate()?;

        let user = self.find_by_email(&input.email).await?;
        let code = self.store_code(user.clone()).await?;

        self.deliver(
            &user,
            "Your Pulse login code",
            &format!(
                "Your login code is {code}. It expires in {} minutes.",
                self.ttl.num_minutes()
            ),
        )
        .await;
        Ok(())
    }

    /// Sign in with a login code.
    pub async fn login_with_otp(&self, input: LoginWithOtpInput) -> AppResult<AuthSession> {
        input.validate()?;

        let user = self.find_by_email(&input.email).await?;
        check_otp(&user, &input.otp, Utc::now())?;

        let mut active: user::ActiveModel = user.into();
        active.otp_code = Set(None);
        active.otp_expires_at = Set(None);
        let user = self.user_repo.update(active).await?;

        self.users.session_for(user)
    }

    async fn find_by_email(&self, email: &str) -> AppResult<user::Model> {
        self.user_repo
            .find_by_email(email)
            .await?
            .ok_or_else(|| AppError::UserNotFound(email.to_string()))
    }

    async fn store_code(&self, user: user::Model) -> AppResult<String> {
        let code = self.id_gen.generate_otp();
        let expires_at = Utc::now() + self.ttl;

        let mut active: user::ActiveModel = user.into();
        active.otp_code = Set(Some(code.clone()));
        active.otp_expires_at = Set(Some(expires_at.into()));
        self.user_repo.update(active).await?;

        Ok(code)
    }

    async fn deliver(&self, user: &user::Model, subject: &str, body: &str) {
        if let Err(e) = self.mailer.send(&user.email, subject, body).await {
            tracing::error!(user_id = %user.id, error = %e, "Failed to send one-time code");
        }
    }
}

/// Check `code` against the pending code of `user` at `now`.
pub fn check_otp(user: &user::Model, code: &str, now: DateTime<Utc>) -> AppResult<()> {
    if user.otp_code.as_deref() != Some(code) {
        return Err(AppError::BadRequest("Invalid OTP".to_string()));
    }

    let expired = user
        .otp_expires_at
        .is_none_or(|expires_at| expires_at.with_timezone(&Utc) <= now);
    if expired {
        return Err(AppError::BadRequest("OTP has expired".to_string()));
    }

    Ok(())
}
