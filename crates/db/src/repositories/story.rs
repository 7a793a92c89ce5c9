//! Story repository (stories, views and reactions).

use std::sync::Arc;

use crate::entities::{Story, StoryReaction, StoryView, story, story_reaction, story_view};
use chrono::{DateTime, Utc};
use pulse_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, ModelTrait, QueryFilter,
    QueryOrder,
};

/// Story repository for database operations.
#[derive(Clone)]
pub struct StoryRepository {
    db: Arc<DatabaseConnection>,
}

impl StoryRepository {
    /// Create a new story repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a story by ID (expired or not).
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<story::Model>> {
        Story::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Unexpired stories of the given authors, newest first.
    pub async fn find_active_by_authors(
        &self,
        author_ids: &[String],
        now: DateTime<Utc>,
    ) -> AppResult<Vec<story::Model>> {
        if author_ids.is_empty() {
            return Ok(vec![]);
        }

        Story::find()
            .filter(story::Column::AuthorId.is_in(author_ids.to_vec()))
            .filter(story::Column::ExpiresAt.gt(now))
            .order_by_desc(story::Column::CreatedAt)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Create a story.
    pub async fn create(&self, model: story::ActiveModel) -> AppResult<story::Model> {
        model
            .insert(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Delete a story. Views and reactions cascade.
    pub async fn delete(&self, story: story::Model) -> AppResult<()> {
        story
            .delete(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    // === Views ===

    /// Find the view `viewer_id` left on `story_id`.
    pub async fn find_view(
        &self,
        story_id: &str,
        viewer_id: &str,
    ) -> AppResult<Option<story_view::Model>> {
        StoryView::find()
            .filter(story_view::Column::StoryId.eq(story_id))
            .filter(story_view::Column::ViewerId.eq(viewer_id))
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Record a view.
    pub async fn create_view(&self, model: story_view::ActiveModel) -> AppResult<story_view::Model> {
        model
            .insert(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Views on the given stories, oldest first.
    pub async fn find_views_for_stories(
        &self,
        story_ids: &[String],
    ) -> AppResult<Vec<story_view::Model>> {
        if story_ids.is_empty() {
            return Ok(vec![]);
        }

        StoryView::find()
            .filter(story_view::Column::StoryId.is_in(story_ids.to_vec()))
            .order_by_asc(story_view::Column::ViewedAt)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    // === Reactions ===

    /// Find the reaction `user_id` left on `story_id`.
    pub async fn find_reaction(
        &self,
        story_id: &str,
        user_id: &str,
    ) -> AppResult<Option<story_reaction::Model>> {
        StoryReaction::find()
            .filter(story_reaction::Column::StoryId.eq(story_id))
            .filter(story_reaction::Column::UserId.eq(user_id))
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Record a reaction.
    pub async fn create_reaction(
        &self,
        model: story_reaction::ActiveModel,
    ) -> AppResult<story_reaction::Model> {
        model
            .insert(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Replace a reaction in place.
    pub async fn update_reaction(
        &self,
        model: story_reaction::ActiveModel,
    ) -> AppResult<story_reaction::Model> {
        model
            .update(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Reactions on the given stories, oldest first.
    pub async fn find_reactions_for_stories(
        &self,
        story_ids: &[String],
    ) -> AppResult<Vec<story_reaction::Model>> {
        if story_ids.is_empty() {
            return Ok(vec![]);
        }

        StoryReaction::find()
            .filter(story_reaction::Column::StoryId.is_in(story_ids.to_vec()))
            .order_by_asc(story_reaction::Column::CreatedAt)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use chrono::Duration;
    use sea_orm::{DatabaseBackend, MockDatabase};

    #[tokio::test]
    async fn test_find_active_by_authors_empty_skips_query() {
        let db = Arc::new(MockDatabase::new(DatabaseBackend::Postgres).into_connection());

        let repo = StoryRepository::new(db);
        let stories = repo.find_active_by_authors(&[], Utc::now()).await.unwrap();

        assert!(stories.is_empty());
    }

    #[tokio::test]
    async fn test_find_view() {
        let view = story_view::Model {
            id: "v1".to_string(),
            story_id: "s1".to_string(),
            viewer_id: "u2".to_string(),
            viewed_at: (Utc::now() - Duration::minutes(5)).into(),
        };

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[view.clone()]])
                .into_connection(),
        );

        let repo = StoryRepository::new(db);
        let found = repo.find_view("s1", "u2").await.unwrap();

        assert_eq!(found, Some(view));
    }
}
