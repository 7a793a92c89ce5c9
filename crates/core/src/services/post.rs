//! Post and reel service.

use std::collections::HashMap;

use chrono::Utc;
use pulse_common::{AppError, AppResult, IdGenerator};
use pulse_db::{
    entities::{post, post_like, saved_post, user},
    repositories::{
        CommentRepository, FollowingRepository, PostRepository, SavedPostRepository,
        UserPrivacyRepository, UserRepository,
    },
};
use sea_orm::Set;
use serde::Deserialize;
use validator::Validate;

use crate::services::{
    notification::{NotificationDraft, NotificationOutbox},
    validation::not_blank,
    visibility::{Audience, Page, PrivacySettings, compose_feed, paginate},
};

/// Maximum posts returned by a search.
const SEARCH_LIMIT: usize = 50;

/// Input for creating a post or reel.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreatePostInput {
    #[validate(length(max = 2200), custom(function = "not_blank"))]
    pub content: String,

    #[serde(default)]
    pub post_type: Option<post::PostKind>,

    #[validate(length(max = 2048))]
    pub media_url: Option<String>,
}

/// Feed filters.
#[derive(Debug, Clone, Default)]
pub struct FeedQuery {
    pub author_id: Option<String>,
    pub kind: Option<post::PostKind>,
}

/// A visible post with its author and engagement.
#[derive(Debug, Clone)]
pub struct PostDetail {
    pub post: post::Model,
    pub author: user::Model,
    /// IDs of the users who liked the post.
    pub likes: Vec<String>,
    pub comment_count: u64,
}

/// Result of a like toggle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LikeState {
    pub likes: Vec<String>,
    pub is_liked: bool,
}

/// Post service.
#[derive(Clone)]
pub struct PostService {
    post_repo: PostRepository,
    saved_repo: SavedPostRepository,
    comment_repo: CommentRepository,
    user_repo: UserRepository,
    privacy_repo: UserPrivacyRepository,
    following_repo: FollowingRepository,
    outbox: NotificationOutbox,
    id_gen: IdGenerator,
}

impl PostService {
    /// Create a new post service.
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub const fn new(
        post_repo: PostRepository,
        saved_repo: SavedPostRepository,
        comment_repo: CommentRepository,
        user_repo: UserRepository,
        privacy_repo: UserPrivacyRepository,
        following_repo: FollowingRepository,
        outbox: NotificationOutbox,
    ) -> Self {
        Self {
            post_repo,
            saved_repo,
            comment_repo,
            user_repo,
            privacy_repo,
            following_repo,
            outbox,
            id_gen: IdGenerator::new(),
        }
    }

    /// Posts visible to `viewer_id`, newest first.
    pub async fn feed(&self, viewer_id: &str, query: FeedQuery) -> AppResult<Vec<PostDetail>> {
        let candidates = self
            .post_repo
            .find_candidates(query.author_id.as_deref(), query.kind)
            .await?;
        let visible = self.filter_visible(viewer_id, candidates).await?;
        self.details(visible).await
    }

    /// One page of the reels visible to `viewer_id`.
    ///
    /// Visibility is applied before paging, so `total` counts visible reels.
    pub async fn reels(&self, viewer_id: &str, page: u64, limit: u64) -> AppResult<Page<PostDetail>> {
        let candidates = self
            .post_repo
            .find_candidates(None, Some(post::PostKind::Reel))
            .await?;
        let visible = self.filter_visible(viewer_id, candidates).await?;

        let page = paginate(visible, page, limit);
        let items = self.details(page.items).await?;

        Ok(Page {
            items,
            page: page.page,
            limit: page.limit,
            total: page.total,
            has_more: page.has_more,
        })
    }

    /// Case-insensitive content search over visible posts.
    pub async fn search(
        &self,
        viewer_id: &str,
        query: &str,
        kind: Option<post::PostKind>,
    ) -> AppResult<Vec<PostDetail>> {
        let query = query.trim();
        if query.is_empty() {
            return Err(AppError::BadRequest("Search query is required".to_string()));
        }

        // Visibility is applied per batch, so keep reading until the limit is
        // filled by visible posts or the matches run out.
        let mut visible = Vec::new();
        let mut offset = 0;
        loop {
            let batch = self
                .post_repo
                .search(query, kind, offset, SEARCH_LIMIT as u64)
                .await?;
            let exhausted = batch.len() < SEARCH_LIMIT;
            offset += SEARCH_LIMIT as u64;

            visible.extend(self.filter_visible(viewer_id, batch).await?);
            if exhausted || visible.len() >= SEARCH_LIMIT {
                break;
            }
        }
        visible.truncate(SEARCH_LIMIT);

        self.details(visible).await
    }

    /// Posts the viewer saved that are still visible to them.
    pub async fn saved(&self, viewer_id: &str) -> AppResult<Vec<PostDetail>> {
        let ids = self.saved_repo.find_post_ids_by_user(viewer_id).await?;
        let posts = self.post_repo.find_by_ids(&ids).await?;
        let visible = self.filter_visible(viewer_id, posts).await?;
        self.details(visible).await
    }

    /// A single post, if the viewer may see it.
    pub async fn get(&self, viewer_id: &str, post_id: &str) -> AppResult<PostDetail> {
        let visible = self.get_visible(viewer_id, post_id).await?;
        let mut details = self.details(vec![visible]).await?;
        details
            .pop()
            .ok_or_else(|| AppError::PostNotFound(post_id.to_string()))
    }

    /// Load a post and its author, treating invisible posts as missing.
    pub async fn get_visible(
        &self,
        viewer_id: &str,
        post_id: &str,
    ) -> AppResult<(post::Model, user::Model)> {
        let post = self.post_repo.get_by_id(post_id).await?;
        self.filter_visible(viewer_id, vec![post])
            .await?
            .pop()
            .ok_or_else(|| AppError::PostNotFound(post_id.to_string()))
    }

    /// Create a post or reel.
    pub async fn create(&self, author_id: &str, input: CreatePostInput) -> AppResult<PostDetail> {
        input.validate()?;

        let author = self.user_repo.get_by_id(author_id).await?;

        let model = post::ActiveModel {
            id: Set(self.id_gen.generate()),
            author_id: Set(author_id.to_string()),
            content: Set(input.content.trim().to_string()),
            media_url: Set(input.media_url),
            kind: Set(input.post_type.unwrap_or_default()),
            created_at: Set(Utc::now().into()),
        };
        let post = self.post_repo.create(model).await?;

        tracing::debug!(post_id = %post.id, author_id = %author_id, kind = ?post.kind, "Created post");

        Ok(PostDetail {
            post,
            author,
            likes: vec![],
            comment_count: 0,
        })
    }

    /// Delete a post. Only the author may delete it.
    pub async fn delete(&self, viewer_id: &str, post_id: &str) -> AppResult<()> {
        let post = self.post_repo.get_by_id(post_id).await?;

        if post.author_id != viewer_id {
            return Err(AppError::Forbidden("Not authorized".to_string()));
        }

        self.post_repo.delete(post).await?;
        tracing::debug!(post_id = %post_id, "Deleted post");
        Ok(())
    }

    /// Like the post, or remove the viewer's like if present.
    pub async fn toggle_like(&self, viewer_id: &str, post_id: &str) -> AppResult<LikeState> {
        let (post, _) = self.get_visible(viewer_id, post_id).await?;

        let is_liked = match self.post_repo.find_like(post_id, viewer_id).await? {
            Some(existing) => {
                self.post_repo.delete_like(existing).await?;
                false
            }
            None => {
                let model = post_like::ActiveModel {
                    id: Set(self.id_gen.generate()),
                    post_id: Set(post_id.to_string()),
                    user_id: Set(viewer_id.to_string()),
                    created_at: Set(Utc::now().into()),
                };
                self.post_repo.create_like(model).await?;

                if post.author_id != viewer_id {
                    let liker = self.user_repo.get_by_id(viewer_id).await?;
                    self.outbox
                        .enqueue(NotificationDraft::like(&post.author_id, &liker, post_id));
                }
                true
            }
        };

        let likes = self
            .post_repo
            .find_likes_for_posts(&[post_id.to_string()])
            .await?
            .into_iter()
            .map(|like| like.user_id)
            .collect();

        Ok(LikeState { likes, is_liked })
    }

    /// Save the post, or remove it from the viewer's saved list.
    ///
    /// Returns whether the post is saved afterwards.
    pub async fn toggle_save(&self, viewer_id: &str, post_id: &str) -> AppResult<bool> {
        self.get_visible(viewer_id, post_id).await?;

        if let Some(existing) = self.saved_repo.find_by_pair(viewer_id, post_id).await? {
            self.saved_repo.delete(existing).await?;
            return Ok(false);
        }

        let model = saved_post::ActiveModel {
            id: Set(self.id_gen.generate()),
            user_id: Set(viewer_id.to_string()),
            post_id: Set(post_id.to_string()),
            created_at: Set(Utc::now().into()),
        };
        self.saved_repo.create(model).await?;
        Ok(true)
    }

    /// Apply the visibility policy to `posts` for `viewer_id`.
    async fn filter_visible(
        &self,
        viewer_id: &str,
        posts: Vec<post::Model>,
    ) -> AppResult<Vec<(post::Model, user::Model)>> {
        if posts.is_empty() {
            return Ok(vec![]);
        }

        let mut author_ids: Vec<String> = posts.iter().map(|p| p.author_id.clone()).collect();
        author_ids.sort();
        author_ids.dedup();

        let authors: HashMap<String, user::Model> = self
            .user_repo
            .find_by_ids(&author_ids)
            .await?
            .into_iter()
            .map(|u| (u.id.clone(), u))
            .collect();
        let privacy = PrivacySettings::index(self.privacy_repo.find_by_user_ids(&author_ids).await?);
        let audience = Audience::load(&self.following_repo, viewer_id).await?;

        Ok(compose_feed(posts, &authors, &privacy, &audience))
    }

    /// Attach likes and comment counts.
    async fn details(&self, visible: Vec<(post::Model, user::Model)>) -> AppResult<Vec<PostDetail>> {
        if visible.is_empty() {
            return Ok(vec![]);
        }

        let ids: Vec<String> = visible.iter().map(|(p, _)| p.id.clone()).collect();

        let mut likes: HashMap<String, Vec<String>> = HashMap::new();
        for like in self.post_repo.find_likes_for_posts(&ids).await? {
            likes.entry(like.post_id).or_default().push(like.user_id);
        }

        let mut comment_counts: HashMap<String, u64> = HashMap::new();
        for comment in self.comment_repo.find_by_post_ids(&ids).await? {
            *comment_counts.entry(comment.post_id).or_default() += 1;
        }

        Ok(visible
            .into_iter()
            .map(|(post, author)| PostDetail {
                likes: likes.remove(&post.id).unwrap_or_default(),
                comment_count: comment_counts.get(&post.id).copied().unwrap_or(0),
                post,
                author,
            })
            .collect())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pulse_db::entities::{
        comment, following,
        user_privacy::{self, AllowMessagesFrom},
    };
    use sea_orm::{DatabaseBackend, MockDatabase};
    use std::sync::Arc;
    use tokio::sync::mpsc;

    struct Mocks {
        post: MockDatabase,
        saved: MockDatabase,
        comment: MockDatabase,
        user: MockDatabase,
        privacy: MockDatabase,
        following: MockDatabase,
    }

    impl Default for Mocks {
        fn default() -> Self {
            let mock = || MockDatabase::new(DatabaseBackend::Postgres);
            Self {
                post: mock(),
                saved: mock(),
                comment: mock(),
                user: mock(),
                privacy: mock(),
                following: mock(),
            }
        }
    }

    impl Mocks {
        fn build(self) -> (PostService, mpsc::Receiver<NotificationDraft>) {
            let (outbox, rx) = NotificationOutbox::channel();
            let service = PostService::new(
                PostRepository::new(Arc::new(self.post.into_connection())),
                SavedPostRepository::new(Arc::new(self.saved.into_connection())),
                CommentRepository::new(Arc::new(self.comment.into_connection())),
                UserRepository::new(Arc::new(self.user.into_connection())),
                UserPrivacyRepository::new(Arc::new(self.privacy.into_connection())),
                FollowingRepository::new(Arc::new(self.following.into_connection())),
                outbox,
            );
            (service, rx)
        }
    }

    fn create_test_user(id: &str) -> user::Model {
        user::Model {
            id: id.to_string(),
            username: id.to_string(),
            username_lower: id.to_string(),
            email: format!("{id}@example.com"),
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

    fn create_test_post(id: &str, author_id: &str, minute: u32) -> post::Model {
        post::Model {
            id: id.to_string(),
            author_id: author_id.to_string(),
            content: "hello".to_string(),
            media_url: None,
            kind: post::PostKind::Post,
            created_at: Utc
                .with_ymd_and_hms(2025, 3, 1, 9, minute, 0)
                .unwrap()
                .into(),
        }
    }

    fn private_settings(user_id: &str) -> user_privacy::Model {
        user_privacy::Model {
            user_id: user_id.to_string(),
            is_private: true,
            allow_messages_from: AllowMessagesFrom::Everyone,
            updated_at: Utc::now().into(),
        }
    }

    fn follow_row(follower: &str, followee: &str) -> following::Model {
        following::Model {
            id: format!("{follower}-{followee}"),
            follower_id: follower.to_string(),
            followee_id: followee.to_string(),
            created_at: Utc::now().into(),
        }
    }

    fn create_test_like(post_id: &str, user_id: &str) -> post_like::Model {
        post_like::Model {
            id: format!("{post_id}-{user_id}"),
            post_id: post_id.to_string(),
            user_id: user_id.to_string(),
            created_at: Utc::now().into(),
        }
    }

    #[tokio::test]
    async fn test_private_post_hidden_from_non_follower() {
        let (service, _rx) = Mocks {
            post: MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[create_test_post("p", "a", 0)]]),
            user: MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[create_test_user("a")]]),
            privacy: MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[private_settings("a")]]),
            following: MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<following::Model>::new()])
                .append_query_results([Vec::<following::Model>::new()]),
            ..Default::default()
        }
        .build();

        let feed = service.feed("c", FeedQuery::default()).await.unwrap();
        assert!(feed.is_empty());
    }

    #[tokio::test]
    async fn test_private_post_visible_to_follower() {
        let (service, _rx) = Mocks {
            post: MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[create_test_post("p", "a", 0)]])
                .append_query_results([[create_test_like("p", "b")]]),
            comment: MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<comment::Model>::new()]),
            user: MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[create_test_user("a")]]),
            privacy: MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[private_settings("a")]]),
            following: MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[follow_row("b", "a")]])
                .append_query_results([Vec::<following::Model>::new()]),
            ..Default::default()
        }
        .build();

        let feed = service.feed("b", FeedQuery::default()).await.unwrap();

        assert_eq!(feed.len(), 1);
        assert_eq!(feed[0].post.id, "p");
        assert_eq!(feed[0].likes, vec!["b".to_string()]);
        assert_eq!(feed[0].comment_count, 0);
    }

    #[tokio::test]
    async fn test_get_invisible_post_is_not_found() {
        let (service, _rx) = Mocks {
            post: MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[create_test_post("p", "a", 0)]]),
            user: MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[create_test_user("a")]]),
            privacy: MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[private_settings("a")]]),
            following: MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<following::Model>::new()])
                .append_query_results([Vec::<following::Model>::new()]),
            ..Default::default()
        }
        .build();

        let result = service.get("c", "p").await;
        assert!(matches!(result, Err(AppError::PostNotFound(_))));
    }

    #[tokio::test]
    async fn test_delete_by_non_author_forbidden() {
        let (service, _rx) = Mocks {
            post: MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[create_test_post("p", "a", 0)]]),
            ..Default::default()
        }
        .build();

        match service.delete("b", "p").await {
            Err(AppError::Forbidden(msg)) => assert_eq!(msg, "Not authorized"),
            other => panic!("Expected Forbidden, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_like_own_post_sends_no_notification() {
        let (service, mut rx) = Mocks {
            post: MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[create_test_post("p", "a", 0)]])
                .append_query_results([Vec::<post_like::Model>::new()])
                .append_query_results([[create_test_like("p", "a")]])
                .append_query_results([[create_test_like("p", "a")]]),
            user: MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[create_test_user("a")]]),
            privacy: MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<user_privacy::Model>::new()]),
            following: MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<following::Model>::new()])
                .append_query_results([Vec::<following::Model>::new()]),
            ..Default::default()
        }
        .build();

        let state = service.toggle_like("a", "p").await.unwrap();

        assert!(state.is_liked);
        assert_eq!(state.likes, vec!["a".to_string()]);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_like_other_post_queues_one_notification() {
        let (service, mut rx) = Mocks {
            post: MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[create_test_post("p", "b", 0)]])
                .append_query_results([Vec::<post_like::Model>::new()])
                .append_query_results([[create_test_like("p", "a")]])
                .append_query_results([[create_test_like("p", "a")]]),
            user: MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[create_test_user("b")]])
                .append_query_results([[create_test_user("a")]]),
            privacy: MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<user_privacy::Model>::new()]),
            following: MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<following::Model>::new()])
                .append_query_results([Vec::<following::Model>::new()]),
            ..Default::default()
        }
        .build();

        service.toggle_like("a", "p").await.unwrap();

        let draft = rx.try_recv().unwrap();
        assert_eq!(draft.recipient_id, "b");
        assert_eq!(draft.actor_id, "a");
        assert_eq!(draft.kind, pulse_db::entities::notification::NotificationKind::Like);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_search_reads_past_hidden_matches() {
        // A full first batch from a private author, then one public match.
        let hidden: Vec<post::Model> = (0..SEARCH_LIMIT)
            .map(|i| create_test_post(&format!("x{i}"), "x", 30))
            .collect();
        let (service, _rx) = Mocks {
            post: MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([hidden])
                .append_query_results([[create_test_post("p1", "b", 10)]])
                .append_query_results([Vec::<post_like::Model>::new()]),
            comment: MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<comment::Model>::new()]),
            user: MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[create_test_user("x")]])
                .append_query_results([[create_test_user("b")]]),
            privacy: MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[private_settings("x")]])
                .append_query_results([Vec::<user_privacy::Model>::new()]),
            following: MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<following::Model>::new()])
                .append_query_results([Vec::<following::Model>::new()])
                .append_query_results([Vec::<following::Model>::new()])
                .append_query_results([Vec::<following::Model>::new()]),
            ..Default::default()
        }
        .build();

        let results = service.search("a", "hello", None).await.unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].post.id, "p1");
    }

    #[tokio::test]
    async fn test_search_requires_query() {
        let (service, _rx) = Mocks::default().build();

        match service.search("u", "", None).await {
            Err(AppError::BadRequest(msg)) => assert_eq!(msg, "Search query is required"),
            other => panic!("Expected BadRequest, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_create_rejects_blank_content() {
        let (service, _rx) = Mocks::default().build();

        let result = service
            .create(
                "a",
                CreatePostInput {
                    content: "   ".to_string(),
                    post_type: None,
                    media_url: None,
                },
            )
            .await;

        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_reels_paginate_after_filtering() {
        let reel = |id: &str, minute| post::Model {
            kind: post::PostKind::Reel,
            ..create_test_post(id, "a", minute)
        };
        let (service, _rx) = Mocks {
            post: MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([vec![reel("r3", 3), reel("r2", 2), reel("r1", 1)]])
                .append_query_results([Vec::<post_like::Model>::new()]),
            comment: MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<comment::Model>::new()]),
            user: MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[create_test_user("a")]]),
            privacy: MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<user_privacy::Model>::new()]),
            following: MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<following::Model>::new()])
                .append_query_results([Vec::<following::Model>::new()]),
            ..Default::default()
        }
        .build();

        let page = service.reels("v", 1, 2).await.unwrap();

        assert_eq!(page.total, 3);
        assert!(page.has_more);
        let ids: Vec<_> = page.items.iter().map(|d| d.post.id.as_str()).collect();
        assert_eq!(ids, vec!["r3", "r2"]);
    }
}
