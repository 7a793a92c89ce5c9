//! User privacy settings repository.

use std::sync::Arc;

use crate::entities::{UserPrivacy, user_privacy};
use pulse_common::{AppError, AppResult};
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};

/// Repository for per-user privacy settings.
#[derive(Clone)]
pub struct UserPrivacyRepository {
    db: Arc<DatabaseConnection>,
}

impl UserPrivacyRepository {
    /// Create a new privacy repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find the settings row of a user, if one was ever written.
    pub async fn find_by_user_id(&self, user_id: &str) -> AppResult<Option<user_privacy::Model>> {
        UserPrivacy::find_by_id(user_id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find the settings rows of several users.
    pub async fn find_by_user_ids(&self, user_ids: &[String]) -> AppResult<Vec<user_privacy::Model>> {
        if user_ids.is_empty() {
            return Ok(vec![]);
        }

        UserPrivacy::find()
            .filter(user_privacy::Column::UserId.is_in(user_ids.to_vec()))
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Create a settings row.
    pub async fn create(&self, model: user_privacy::ActiveModel) -> AppResult<user_privacy::Model> {
        model
            .insert(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Update a settings row.
    pub async fn update(&self, model: user_privacy::ActiveModel) -> AppResult<user_privacy::Model> {
        model
            .update(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}
