//! Saved post repository.

use std::sync::Arc;

use crate::entities::{SavedPost, saved_post};
use pulse_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, ModelTrait, QueryFilter,
    QueryOrder,
};

/// Repository for bookmarked posts.
#[derive(Clone)]
pub struct SavedPostRepository {
    db: Arc<DatabaseConnection>,
}

impl SavedPostRepository {
    /// Create a new saved post repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a bookmark by user and post.
    pub async fn find_by_pair(
        &self,
        user_id: &str,
        post_id: &str,
    ) -> AppResult<Option<saved_post::Model>> {
        SavedPost::find()
            .filter(saved_post::Column::UserId.eq(user_id))
            .filter(saved_post::Column::PostId.eq(post_id))
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Create a bookmark.
    pub async fn create(&self, model: saved_post::ActiveModel) -> AppResult<saved_post::Model> {
        model
            .insert(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Remove a bookmark.
    pub async fn delete(&self, saved: saved_post::Model) -> AppResult<()> {
        saved
            .delete(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Bookmarked post IDs of a user, most recently saved first.
    pub async fn find_post_ids_by_user(&self, user_id: &str) -> AppResult<Vec<String>> {
        let rows = SavedPost::find()
            .filter(saved_post::Column::UserId.eq(user_id))
            .order_by_desc(saved_post::Column::CreatedAt)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(rows.into_iter().map(|s| s.post_id).collect())
    }
}
