//! Message repository (messages and read receipts).

use std::sync::Arc;

use crate::entities::{Message, MessageRead, message, message_read};
use pulse_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    sea_query::{OnConflict, Query},
};

/// Message repository for database operations.
#[derive(Clone)]
pub struct MessageRepository {
    db: Arc<DatabaseConnection>,
}

impl MessageRepository {
    /// Create a new message repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Create a message.
    pub async fn create(&self, model: message::ActiveModel) -> AppResult<message::Model> {
        model
            .insert(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find messages by IDs.
    pub async fn find_by_ids(&self, ids: &[String]) -> AppResult<Vec<message::Model>> {
        if ids.is_empty() {
            return Ok(vec![]);
        }

        Message::find()
            .filter(message::Column::Id.is_in(ids.to_vec()))
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Messages of a conversation, oldest first.
    pub async fn find_by_conversation(&self, conversation_id: &str) -> AppResult<Vec<message::Model>> {
        Message::find()
            .filter(message::Column::ConversationId.eq(conversation_id))
            .order_by_asc(message::Column::CreatedAt)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Messages in the given conversations that `reader_id` did not send and
    /// has no receipt for.
    pub async fn find_unread(
        &self,
        conversation_ids: &[String],
        reader_id: &str,
    ) -> AppResult<Vec<message::Model>> {
        if conversation_ids.is_empty() {
            return Ok(vec![]);
        }

        let read_by_reader = Query::select()
            .column(message_read::Column::MessageId)
            .from(MessageRead)
            .and_where(message_read::Column::UserId.eq(reader_id))
            .to_owned();

        Message::find()
            .filter(message::Column::ConversationId.is_in(conversation_ids.to_vec()))
            .filter(message::Column::SenderId.ne(reader_id))
            .filter(message::Column::Id.not_in_subquery(read_by_reader))
            .order_by_asc(message::Column::CreatedAt)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Insert read receipts, skipping any `(message, reader)` pair that
    /// already has one. Returns the number of receipts written.
    pub async fn insert_reads(&self, reads: Vec<message_read::ActiveModel>) -> AppResult<u64> {
        if reads.is_empty() {
            return Ok(0);
        }

        MessageRead::insert_many(reads)
            .on_conflict(
                OnConflict::columns([message_read::Column::MessageId, message_read::Column::UserId])
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Read receipts on the given messages.
    pub async fn find_reads_for_messages(
        &self,
        message_ids: &[String],
    ) -> AppResult<Vec<message_read::Model>> {
        if message_ids.is_empty() {
            return Ok(vec![]);
        }

        MessageRead::find()
            .filter(message_read::Column::MessageId.is_in(message_ids.to_vec()))
            .order_by_asc(message_read::Column::ReadAt)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};

    #[tokio::test]
    async fn test_insert_reads_empty_is_noop() {
        let db = Arc::new(MockDatabase::new(DatabaseBackend::Postgres).into_connection());

        let repo = MessageRepository::new(db);
        assert_eq!(repo.insert_reads(vec![]).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_insert_reads_reports_rows_written() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_exec_results([MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 2,
                }])
                .into_connection(),
        );

        let repo = MessageRepository::new(db);
        let reads = ["m1", "m2"]
            .into_iter()
            .map(|id| message_read::ActiveModel {
                id: sea_orm::Set(format!("r-{id}")),
                message_id: sea_orm::Set(id.to_string()),
                user_id: sea_orm::Set("bob".to_string()),
                read_at: sea_orm::Set(chrono::Utc::now().into()),
            })
            .collect();

        assert_eq!(repo.insert_reads(reads).await.unwrap(), 2);
    }
}
