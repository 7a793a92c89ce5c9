//! Notifications and the fan-out outbox.
//!
//! Follow, like and comment actions enqueue a [`NotificationDraft`] on the
//! [`NotificationOutbox`]. A [`NotificationWorker`] drains the queue in the
//! background and persists the records, so a failure there never reaches
//! the request that triggered it.

use std::collections::HashMap;

use chrono::Utc;
use pulse_common::{AppError, AppResult, IdGenerator};
use pulse_db::{
    entities::{notification, user},
    repositories::{NotificationRepository, UserRepository},
};
use sea_orm::Set;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Channel buffer size for pending notifications.
const OUTBOX_BUFFER_SIZE: usize = 1000;

/// Maximum notifications returned by a listing.
const LIST_LIMIT: u64 = 50;

/// A notification waiting to be persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationDraft {
    pub recipient_id: String,
    pub actor_id: String,
    pub kind: notification::NotificationKind,
    pub post_id: Option<String>,
    pub message: String,
}

impl NotificationDraft {
    /// `actor` started following `recipient_id`.
    #[must_use]
    pub fn follow(recipient_id: &str, actor: &user::Model) -> Self {
        Self {
            recipient_id: recipient_id.to_string(),
            actor_id: actor.id.clone(),
            kind: notification::NotificationKind::Follow,
            post_id: None,
            message: format!("{} started following you", actor.username),
        }
    }

    /// `actor` liked a post owned by `recipient_id`.
    #[must_use]
    pub fn like(recipient_id: &str, actor: &user::Model, post_id: &str) -> Self {
        Self {
            recipient_id: recipient_id.to_string(),
            actor_id: actor.id.clone(),
            kind: notification::NotificationKind::Like,
            post_id: Some(post_id.to_string()),
            message: format!("{} liked your post", actor.username),
        }
    }

    /// `actor` commented on a post owned by `recipient_id`.
    #[must_use]
    pub fn comment(recipient_id: &str, actor: &user::Model, post_id: &str) -> Self {
        Self {
            recipient_id: recipient_id.to_string(),
            actor_id: actor.id.clone(),
            kind: notification::NotificationKind::Comment,
            post_id: Some(post_id.to_string()),
            message: format!("{} commented on your post", actor.username),
        }
    }

    /// Whether the actor would be notifying themselves.
    #[must_use]
    pub fn is_self_addressed(&self) -> bool {
        self.actor_id == self.recipient_id
    }
}

/// Sending half of the notification queue.
#[derive(Debug, Clone)]
pub struct NotificationOutbox {
    sender: mpsc::Sender<NotificationDraft>,
}

impl NotificationOutbox {
    /// Create an outbox and the receiver to hand to a [`NotificationWorker`].
    #[must_use]
    pub fn channel() -> (Self, mpsc::Receiver<NotificationDraft>) {
        let (sender, receiver) = mpsc::channel(OUTBOX_BUFFER_SIZE);
        (Self { sender }, receiver)
    }

    /// Queue a draft without waiting.
    ///
    /// Self-addressed drafts are dropped. A full or closed queue is logged
    /// and otherwise ignored.
    pub fn enqueue(&self, draft: NotificationDraft) {
        if draft.is_self_addressed() {
            return;
        }

        if let Err(e) = self.sender.try_send(draft) {
            warn!(error = %e, "Failed to enqueue notification");
        }
    }
}

/// Background task persisting queued drafts.
pub struct NotificationWorker {
    receiver: mpsc::Receiver<NotificationDraft>,
    service: NotificationService,
}

impl NotificationWorker {
    /// Create a worker.
    #[must_use]
    pub const fn new(
        receiver: mpsc::Receiver<NotificationDraft>,
        service: NotificationService,
    ) -> Self {
        Self { receiver, service }
    }

    /// Spawn the worker on the current runtime.
    pub fn start(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            info!("Notification worker starting");
            self.run().await;
            info!("Notification worker stopped");
        })
    }

    /// Drain the queue until every outbox handle is dropped.
    pub async fn run(mut self) {
        while let Some(draft) = self.receiver.recv().await {
            match self.service.create(draft).await {
                Ok(created) => {
                    debug!(
                        notification_id = %created.id,
                        recipient_id = %created.recipient_id,
                        "Notification stored"
                    );
                }
                Err(e) => {
                    error!(error = %e, "Failed to store notification");
                }
            }
        }
    }
}

/// A notification with the user who triggered it.
#[derive(Debug, Clone)]
pub struct NotificationDetail {
    pub notification: notification::Model,
    pub actor: Option<user::Model>,
}

/// Input for creating a notification by hand.
#[derive(Debug, Clone)]
pub struct CreateNotificationInput {
    pub recipient_id: String,
    pub kind: notification::NotificationKind,
    pub message: String,
    pub post_id: Option<String>,
}

/// Notification service.
#[derive(Clone)]
pub struct NotificationService {
    notification_repo: NotificationRepository,
    user_repo: UserRepository,
    id_gen: IdGenerator,
}

impl NotificationService {
    /// Create a new notification service.
    #[must_use]
    pub const fn new(notification_repo: NotificationRepository, user_repo: UserRepository) -> Self {
        Self {
            notification_repo,
            user_repo,
            id_gen: IdGenerator::new(),
        }
    }

    /// Persist a draft.
    pub async fn create(&self, draft: NotificationDraft) -> AppResult<notification::Model> {
        let model = notification::ActiveModel {
            id: Set(self.id_gen.generate()),
            recipient_id: Set(draft.recipient_id),
            actor_id: Set(draft.actor_id),
            kind: Set(draft.kind),
            post_id: Set(draft.post_id),
            message: Set(draft.message),
            is_read: Set(false),
            created_at: Set(Utc::now().into()),
        };

        self.notification_repo.create(model).await
    }

    /// Create a notification on behalf of `actor_id`.
    pub async fn create_manual(
        &self,
        actor_id: &str,
        input: CreateNotificationInput,
    ) -> AppResult<notification::Model> {
        self.user_repo.get_by_id(&input.recipient_id).await?;

        self.create(NotificationDraft {
            recipient_id: input.recipient_id,
            actor_id: actor_id.to_string(),
            kind: input.kind,
            post_id: input.post_id,
            message: input.message,
        })
        .await
    }

    /// Latest notifications of a user, newest first.
    pub async fn list(&self, user_id: &str) -> AppResult<Vec<NotificationDetail>> {
        let notifications = self
            .notification_repo
            .find_by_recipient(user_id, LIST_LIMIT)
            .await?;

        let mut actor_ids: Vec<String> = notifications.iter().map(|n| n.actor_id.clone()).collect();
        actor_ids.sort();
        actor_ids.dedup();

        let actors: HashMap<String, user::Model> = self
            .user_repo
            .find_by_ids(&actor_ids)
            .await?
            .into_iter()
            .map(|u| (u.id.clone(), u))
            .collect();

        Ok(notifications
            .into_iter()
            .map(|notification| {
                let actor = actors.get(&notification.actor_id).cloned();
                NotificationDetail {
                    notification,
                    actor,
                }
            })
            .collect())
    }

    /// Number of unread notifications.
    pub async fn count_unread(&self, user_id: &str) -> AppResult<u64> {
        self.notification_repo.count_unread(user_id).await
    }

    /// Mark one of the caller's notifications as read.
    pub async fn mark_as_read(
        &self,
        user_id: &str,
        notification_id: &str,
    ) -> AppResult<notification::Model> {
        let notification = self
            .notification_repo
            .find_by_id(notification_id)
            .await?
            .filter(|n| n.recipient_id == user_id)
            .ok_or_else(|| AppError::NotFound("Notification not found".to_string()))?;

        if notification.is_read {
            return Ok(notification);
        }

        self.notification_repo.mark_as_read(notification).await
    }

    /// Mark every notification of the caller as read.
    pub async fn mark_all_as_read(&self, user_id: &str) -> AppResult<u64> {
        self.notification_repo.mark_all_as_read(user_id).await
    }

    /// Delete every notification of the caller.
    pub async fn delete_all(&self, user_id: &str) -> AppResult<u64> {
        self.notification_repo.delete_all_for_user(user_id).await
    }
}
