//! Conversation repository.

use std::sync::Arc;

use crate::entities::{Conversation, conversation};
use chrono::{DateTime, Utc};
use pulse_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, Set, sea_query::NullOrdering,
};

/// Conversation repository for database operations.
#[derive(Clone)]
pub struct ConversationRepository {
    db: Arc<DatabaseConnection>,
}

impl ConversationRepository {
    /// Create a new conversation repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a conversation by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<conversation::Model>> {
        Conversation::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find a conversation by ID, returning an error if not found.
    pub async fn get_by_id(&self, id: &str) -> AppResult<conversation::Model> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::ConversationNotFound(id.to_string()))
    }

    /// Find the conversation between two users, in either order.
    pub async fn find_by_pair(
        &self,
        user_a: &str,
        user_b: &str,
    ) -> AppResult<Option<conversation::Model>> {
        let (first, second) = conversation::ordered_pair(user_a, user_b);

        Conversation::find()
            .filter(conversation::Column::ParticipantA.eq(first))
            .filter(conversation::Column::ParticipantB.eq(second))
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Create a conversation.
    pub async fn create(&self, model: conversation::ActiveModel) -> AppResult<conversation::Model> {
        model
            .insert(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Conversations of a user, most recent activity first.
    pub async fn find_by_participant(&self, user_id: &str) -> AppResult<Vec<conversation::Model>> {
        Conversation::find()
            .filter(
                Condition::any()
                    .add(conversation::Column::ParticipantA.eq(user_id))
                    .add(conversation::Column::ParticipantB.eq(user_id)),
            )
            .order_by_with_nulls(
                conversation::Column::LastMessageAt,
                sea_orm::Order::Desc,
                NullOrdering::Last,
            )
            .order_by_desc(conversation::Column::CreatedAt)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Point the conversation at its newest message.
    pub async fn set_last_message(
        &self,
        conversation: conversation::Model,
        message_id: &str,
        at: DateTime<Utc>,
    ) -> AppResult<conversation::Model> {
        let mut active: conversation::ActiveModel = conversation.into();
        active.last_message_id = Set(Some(message_id.to_string()));
        active.last_message_at = Set(Some(at.into()));

        active
            .update(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use sea_orm::{DatabaseBackend, MockDatabase};

    #[tokio::test]
    async fn test_get_by_id_not_found() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<conversation::Model>::new()])
                .into_connection(),
        );

        let repo = ConversationRepository::new(db);
        let result = repo.get_by_id("c1").await;

        assert!(matches!(result, Err(AppError::ConversationNotFound(_))));
    }

    #[tokio::test]
    async fn test_find_by_pair_is_order_insensitive() {
        let conversation = conversation::Model {
            id: "c1".to_string(),
            participant_a: "alice".to_string(),
            participant_b: "bob".to_string(),
            last_message_id: None,
            last_message_at: None,
            created_at: Utc::now().into(),
        };

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[conversation.clone()]])
                .into_connection(),
        );

        let repo = ConversationRepository::new(db);
        let found = repo.find_by_pair("bob", "alice").await.unwrap();

        assert_eq!(found.unwrap().id, "c1");
    }
}
