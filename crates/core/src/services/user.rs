//! Account and profile service.

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use chrono::Utc;
use pulse_common::{AppError, AppResult, IdGenerator};
use pulse_db::{
    entities::{
        user,
        user_privacy::{self, AllowMessagesFrom},
    },
    repositories::{FollowingRepository, UserPrivacyRepository, UserRepository},
};
use sea_orm::Set;
use serde::Deserialize;
use validator::Validate;

use crate::services::{token::TokenService, visibility::PrivacySettings};

/// Maximum users returned by search and suggestions.
const USER_LIST_LIMIT: u64 = 20;

/// Input for registering an account.
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterInput {
    #[validate(length(min = 3, max = 30))]
    pub username: String,

    #[validate(email)]
    pub email: String,

    #[validate(length(min = 6, max = 128))]
    pub password: String,
}

/// Input for password login.
#[derive(Debug, Deserialize, Validate)]
pub struct LoginInput {
    #[validate(email)]
    pub email: String,

    #[validate(length(min = 1))]
    pub password: String,
}

/// Input for updating the caller's profile.
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileInput {
    #[validate(length(min = 3, max = 30))]
    pub username: Option<String>,

    #[validate(length(max = 500))]
    pub bio: Option<String>,

    /// URL of an already uploaded image.
    #[validate(length(max = 2048))]
    pub profile_picture: Option<String>,
}

/// Input for changing the caller's password.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordInput {
    #[validate(length(min = 1))]
    pub current_password: String,

    #[validate(length(min = 6, max = 128))]
    pub new_password: String,
}

/// Input for updating privacy settings.
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePrivacyInput {
    pub is_private: Option<bool>,
    pub allow_messages_from: Option<AllowMessagesFrom>,
}

/// A signed-in user and their bearer token.
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub token: String,
    pub user: user::Model,
}

/// A user with their follow graph and privacy settings.
#[derive(Debug, Clone)]
pub struct Profile {
    pub user: user::Model,
    pub follower_ids: Vec<String>,
    pub following_ids: Vec<String>,
    pub privacy: PrivacySettings,
}

/// User service for accounts and profiles.
#[derive(Clone)]
pub struct UserService {
    user_repo: UserRepository,
    privacy_repo: UserPrivacyRepository,
    following_repo: FollowingRepository,
    tokens: TokenService,
    id_gen: IdGenerator,
}

impl UserService {
    /// Create a new user service.
    #[must_use]
    pub const fn new(
        user_repo: UserRepository,
        privacy_repo: UserPrivacyRepository,
        following_repo: FollowingRepository,
        tokens: TokenService,
    ) -> Self {
        Self {
            user_repo,
            privacy_repo,
            following_repo,
            tokens,
            id_gen: IdGenerator::new(),
        }
    }

    /// Register a new account and sign it in.
    pub async fn register(&self, input: RegisterInput) -> AppResult<AuthSession> {
        input.validate()?;

        if self
            .user_repo
            .find_by_email_or_username(&input.email, &input.username)
            .await?
            .is_some()
        {
            return Err(AppError::BadRequest("User already exists".to_string()));
        }

        let password_hash = hash_password(&input.password)?;

        let model = user::ActiveModel {
            id: Set(self.id_gen.generate()),
            username_lower: Set(input.username.to_lowercase()),
            username: Set(input.username),
            email: Set(input.email.to_lowercase()),
            password_hash: Set(password_hash),
            bio: Set(None),
            profile_picture: Set(None),
            email_verified: Set(false),
            otp_code: Set(None),
            otp_expires_at: Set(None),
            created_at: Set(Utc::now().into()),
            updated_at: Set(None),
        };

        let user = self.user_repo.create(model).await?;
        tracing::info!(user_id = %user.id, username = %user.username, "User registered");

        self.session_for(user)
    }

    /// Sign in with email and password.
    pub async fn login(&self, input: LoginInput) -> AppResult<AuthSession> {
        input.validate()?;

        let invalid = || AppError::BadRequest("Invalid credentials".to_string());

        let user = self
            .user_repo
            .find_by_email(&input.email)
            .await?
            .ok_or_else(invalid)?;

        if !verify_password(&input.password, &user.password_hash)? {
            return Err(invalid());
        }

        self.session_for(user)
    }

    /// Issue a session for an already authenticated user.
    pub fn session_for(&self, user: user::Model) -> AppResult<AuthSession> {
        let token = self.tokens.issue(&user)?;
        Ok(AuthSession { token, user })
    }

    /// Load a profile with follower and following IDs.
    pub async fn get_profile(&self, user_id: &str) -> AppResult<Profile> {
        let user = self.user_repo.get_by_id(user_id).await?;
        let follower_ids = self.following_repo.find_follower_ids(user_id).await?;
        let following_ids = self.following_repo.find_followee_ids(user_id).await?;
        let privacy = self.get_privacy(user_id).await?;

        Ok(Profile {
            user,
            follower_ids,
            following_ids,
            privacy,
        })
    }

    /// Update the caller's profile.
    pub async fn update_profile(
        &self,
        user_id: &str,
        input: UpdateProfileInput,
    ) -> AppResult<user::Model> {
        input.validate()?;

        let user = self.user_repo.get_by_id(user_id).await?;
        let mut active: user::ActiveModel = user.clone().into();

        if let Some(username) = input.username.filter(|name| *name != user.username) {
            let taken = self
                .user_repo
                .find_by_username(&username)
                .await?
                .is_some_and(|existing| existing.id != user.id);
            if taken {
                return Err(AppError::BadRequest("Username already taken".to_string()));
            }
            active.username_lower = Set(username.to_lowercase());
            active.username = Set(username);
        }
        if let Some(bio) = input.bio {
            active.bio = Set(Some(bio));
        }
        if let Some(picture) = input.profile_picture {
            active.profile_picture = Set(Some(picture));
        }
        active.updated_at = Set(Some(Utc::now().into()));

        self.user_repo.update(active).await
    }

    /// Change the caller's password.
    pub async fn change_password(&self, user_id: &str, input: ChangePasswordInput) -> AppResult<()> {
        input.validate()?;

        let user = self.user_repo.get_by_id(user_id).await?;

        if !verify_password(&input.current_password, &user.password_hash)? {
            return Err(AppError::BadRequest(
                "Current password is incorrect".to_string(),
            ));
        }

        let mut active: user::ActiveModel = user.into();
        active.password_hash = Set(hash_password(&input.new_password)?);
        active.updated_at = Set(Some(Utc::now().into()));
        self.user_repo.update(active).await?;

        tracing::info!(user_id = %user_id, "Password changed");
        Ok(())
    }

    /// Effective privacy settings; defaults when none are stored.
    pub async fn get_privacy(&self, user_id: &str) -> AppResult<PrivacySettings> {
        let row = self.privacy_repo.find_by_user_id(user_id).await?;
        Ok(PrivacySettings::of(row.as_ref()))
    }

    /// Update privacy settings, creating the record on first change.
    pub async fn update_privacy(
        &self,
        user_id: &str,
        input: UpdatePrivacyInput,
    ) -> AppResult<PrivacySettings> {
        input.validate()?;

        let now = Utc::now();
        let saved = match self.privacy_repo.find_by_user_id(user_id).await? {
            Some(existing) => {
                let mut active: user_privacy::ActiveModel = existing.into();
                if let Some(is_private) = input.is_private {
                    active.is_private = Set(is_private);
                }
                if let Some(allow) = input.allow_messages_from {
                    active.allow_messages_from = Set(allow);
                }
                active.updated_at = Set(now.into());
                self.privacy_repo.update(active).await?
            }
            None => {
                let defaults = PrivacySettings::default();
                let model = user_privacy::ActiveModel {
                    user_id: Set(user_id.to_string()),
                    is_private: Set(input.is_private.unwrap_or(defaults.is_private)),
                    allow_messages_from: Set(input
                        .allow_messages_from
                        .unwrap_or(defaults.allow_messages_from)),
                    updated_at: Set(now.into()),
                };
                self.privacy_repo.create(model).await?
            }
        };

        Ok(PrivacySettings::from(&saved))
    }

    /// Case-insensitive username search.
    pub async fn search(&self, query: &str) -> AppResult<Vec<user::Model>> {
        let query = query.trim();
        if query.is_empty() {
            return Err(AppError::BadRequest("Search query is required".to_string()));
        }

        self.user_repo.search(query, USER_LIST_LIMIT).await
    }

    /// Users the viewer does not follow yet, excluding the viewer.
    pub async fn suggestions(&self, viewer_id: &str) -> AppResult<Vec<user::Model>> {
        let mut exclude = self.following_repo.find_followee_ids(viewer_id).await?;
        exclude.push(viewer_id.to_string());

        self.user_repo.find_excluding(&exclude, USER_LIST_LIMIT).await
    }

    /// Users following `user_id`, most recent first.
    pub async fn followers(&self, user_id: &str) -> AppResult<Vec<user::Model>> {
        self.user_repo.get_by_id(user_id).await?;
        let ids = self.following_repo.find_follower_ids(user_id).await?;
        self.users_in_order(&ids).await
    }

    /// Users `user_id` follows, most recent first.
    pub async fn following(&self, user_id: &str) -> AppResult<Vec<user::Model>> {
        self.user_repo.get_by_id(user_id).await?;
        let ids = self.following_repo.find_followee_ids(user_id).await?;
        self.users_in_order(&ids).await
    }

    async fn users_in_order(&self, ids: &[String]) -> AppResult<Vec<user::Model>> {
        let mut users = self.user_repo.find_by_ids(ids).await?;
        users.sort_by_key(|u| ids.iter().position(|id| *id == u.id));
        Ok(users)
    }
}

/// Hash a password using Argon2.
pub fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| AppError::Internal(format!("Failed to hash password: {e}")))
}

/// Verify a password against a hash.
pub fn verify_password(password: &str, hash: &str) -> AppResult<bool> {
    let parsed_hash =
        PasswordHash::new(hash).map_err(|e| AppError::Internal(format!("Invalid hash: {e}")))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}
