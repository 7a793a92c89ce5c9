//! Following service.

use chrono::Utc;
use pulse_common::{AppError, AppResult, IdGenerator};
use pulse_db::{
    entities::following,
    repositories::{FollowingRepository, UserRepository},
};
use sea_orm::Set;

use crate::services::notification::{NotificationDraft, NotificationOutbox};

/// Following service for managing follow relationships.
///
/// A follow is one row that serves as both sides of the relation, so
/// creating or deleting it is atomic.
#[derive(Clone)]
pub struct FollowingService {
    following_repo: FollowingRepository,
    user_repo: UserRepository,
    outbox: NotificationOutbox,
    id_gen: IdGenerator,
}

impl FollowingService {
    /// Create a new following service.
    #[must_use]
    pub const fn new(
        following_repo: FollowingRepository,
        user_repo: UserRepository,
        outbox: NotificationOutbox,
    ) -> Self {
        Self {
            following_repo,
            user_repo,
            outbox,
            id_gen: IdGenerator::new(),
        }
    }

    /// Follow a user.
    ///
    /// Following twice is rejected rather than ignored.
    pub async fn follow(&self, actor_id: &str, target_id: &str) -> AppResult<following::Model> {
        if target_id.trim().is_empty() {
            return Err(AppError::BadRequest("User ID required".to_string()));
        }
        if actor_id == target_id {
            return Err(AppError::BadRequest("Cannot follow yourself".to_string()));
        }

        self.user_repo
            .find_by_id(target_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Target user not found".to_string()))?;

        if self.following_repo.is_following(actor_id, target_id).await? {
            return Err(AppError::BadRequest(
                "Already following this user".to_string(),
            ));
        }

        let actor = self.user_repo.get_by_id(actor_id).await?;

        let model = following::ActiveModel {
            id: Set(self.id_gen.generate()),
            follower_id: Set(actor_id.to_string()),
            followee_id: Set(target_id.to_string()),
            created_at: Set(Utc::now().into()),
        };
        let created = self.following_repo.create(model).await?;

        tracing::debug!(follower_id = %actor_id, followee_id = %target_id, "Followed user");
        self.outbox.enqueue(NotificationDraft::follow(target_id, &actor));

        Ok(created)
    }

    /// Unfollow a user. Not following is not an error.
    pub async fn unfollow(&self, actor_id: &str, target_id: &str) -> AppResult<()> {
        if target_id.trim().is_empty() {
            return Err(AppError::BadRequest("User ID required".to_string()));
        }

        let removed = self
            .following_repo
            .delete_by_pair(actor_id, target_id)
            .await?;

        tracing::debug!(
            follower_id = %actor_id,
            followee_id = %target_id,
            removed,
            "Unfollowed user"
        );
        Ok(())
    }

    /// Whether `follower_id` follows `followee_id`.
    pub async fn is_following(&self, follower_id: &str, followee_id: &str) -> AppResult<bool> {
        self.following_repo
            .is_following(follower_id, followee_id)
            .await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pulse_db::entities::user;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};
    use std::sync::Arc;
    use tokio::sync::mpsc;

    fn create_test_user(id: &str, username: &str) -> user::Model {
        user::Model {
            id: id.to_string(),
            username: username.to_string(),
            username_lower: username.to_lowercase(),
            email: format!("{username}@example.com"),
            password_hash: String::new(),
            bio: None,
            profile_picture: None,
            email_verified: false,
            otp_code: None,
            otp_expires_at: None,
            created_at: Utc::now().into(),
            updated_at: None,
        }
    }

    fn create_test_following(id: &str, follower_id: &str, followee_id: &str) -> following::Model {
        following::Model {
            id: id.to_string(),
            follower_id: follower_id.to_string(),
            followee_id: followee_id.to_string(),
            created_at: Utc::now().into(),
        }
    }

    fn service(
        following_db: MockDatabase,
        user_db: MockDatabase,
    ) -> (FollowingService, mpsc::Receiver<NotificationDraft>) {
        let (outbox, rx) = NotificationOutbox::channel();
        let service = FollowingService::new(
            FollowingRepository::new(Arc::new(following_db.into_connection())),
            UserRepository::new(Arc::new(user_db.into_connection())),
            outbox,
        );
        (service, rx)
    }

    fn mock() -> MockDatabase {
        MockDatabase::new(DatabaseBackend::Postgres)
    }

    #[tokio::test]
    async fn test_follow_yourself_returns_error() {
        let (service, _rx) = service(mock(), mock());

        let result = service.follow("user1", "user1").await;

        match result {
            Err(AppError::BadRequest(msg)) => assert_eq!(msg, "Cannot follow yourself"),
            other => panic!("Expected BadRequest, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_follow_requires_user_id() {
        let (service, _rx) = service(mock(), mock());

        let result = service.follow("user1", "").await;

        match result {
            Err(AppError::BadRequest(msg)) => assert_eq!(msg, "User ID required"),
            other => panic!("Expected BadRequest, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_follow_unknown_target() {
        let (service, _rx) = service(
            mock(),
            mock().append_query_results([Vec::<user::Model>::new()]),
        );

        let result = service.follow("user1", "ghost").await;

        match result {
            Err(AppError::NotFound(msg)) => assert_eq!(msg, "Target user not found"),
            other => panic!("Expected NotFound, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_follow_already_following_returns_error() {
        let (service, mut rx) = service(
            mock().append_query_results([[create_test_following("f1", "user1", "user2")]]),
            mock().append_query_results([[create_test_user("user2", "bob")]]),
        );

        let result = service.follow("user1", "user2").await;

        match result {
            Err(AppError::BadRequest(msg)) => assert_eq!(msg, "Already following this user"),
            other => panic!("Expected BadRequest, got {other:?}"),
        }
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_follow_creates_row_and_notifies() {
        let (service, mut rx) = service(
            mock()
                .append_query_results([Vec::<following::Model>::new()])
                .append_query_results([[create_test_following("f1", "user1", "user2")]]),
            mock()
                .append_query_results([[create_test_user("user2", "bob")]])
                .append_query_results([[create_test_user("user1", "alice")]]),
        );

        let created = service.follow("user1", "user2").await.unwrap();
        assert_eq!(created.followee_id, "user2");

        let draft = rx.try_recv().unwrap();
        assert_eq!(draft.recipient_id, "user2");
        assert_eq!(draft.actor_id, "user1");
        assert_eq!(draft.message, "alice started following you");
    }

    #[tokio::test]
    async fn test_unfollow_not_following_is_silent() {
        let (service, _rx) = service(
            mock().append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 0,
            }]),
            mock(),
        );

        service.unfollow("user1", "user2").await.unwrap();
    }
}
