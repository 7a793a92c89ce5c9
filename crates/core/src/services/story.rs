//! Story service.
//!
//! A story is reachable by its author and by mutual follows of the author
//! until it expires. The same check guards listing, fetching, viewing and
//! reacting; an unreachable story is reported as missing.

use std::collections::HashMap;

use chrono::{Duration, Utc};
use pulse_common::{AppError, AppResult, IdGenerator};
use pulse_db::{
    entities::{story, story_reaction, story_view, user},
    repositories::{FollowingRepository, StoryRepository, UserRepository},
};
use sea_orm::Set;
use serde::Deserialize;
use validator::Validate;

use crate::services::{
    messaging::{MessageDetail, MessagingService},
    validation::not_blank,
    visibility::{Audience, can_view_story, check_story_reply},
};

/// Input for posting a story.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateStoryInput {
    pub media_type: story::MediaType,

    #[validate(length(min = 1, max = 2048))]
    pub media_url: String,

    #[validate(length(max = 500))]
    pub caption: Option<String>,
}

/// Input for reacting to a story.
#[derive(Debug, Deserialize, Validate)]
pub struct ReactInput {
    #[validate(length(min = 1, max = 16))]
    pub emoji: String,
}

/// Input for replying to a story.
#[derive(Debug, Deserialize, Validate)]
pub struct StoryReplyInput {
    #[validate(length(max = 2000), custom(function = "not_blank"))]
    pub content: String,
}

/// A story with its author, views and reactions.
#[derive(Debug, Clone)]
pub struct StoryDetail {
    pub story: story::Model,
    pub author: user::Model,
    pub views: Vec<story_view::Model>,
    pub reactions: Vec<story_reaction::Model>,
}

/// Story service.
#[derive(Clone)]
pub struct StoryService {
    story_repo: StoryRepository,
    user_repo: UserRepository,
    following_repo: FollowingRepository,
    messaging: MessagingService,
    ttl: Duration,
    id_gen: IdGenerator,
}

impl StoryService {
    /// Create a new story service. Stories expire `ttl` after creation.
    #[must_use]
    pub const fn new(
        story_repo: StoryRepository,
        user_repo: UserRepository,
        following_repo: FollowingRepository,
        messaging: MessagingService,
        ttl: Duration,
    ) -> Self {
        Self {
            story_repo,
            user_repo,
            following_repo,
            messaging,
            ttl,
            id_gen: IdGenerator::new(),
        }
    }

    /// Home story feed: own and mutual follows' unexpired stories, newest first.
    pub async fn feed(&self, viewer_id: &str) -> AppResult<Vec<StoryDetail>> {
        let audience = Audience::load(&self.following_repo, viewer_id).await?;

        let mut author_ids = audience.mutual_ids();
        author_ids.push(viewer_id.to_string());

        let now = Utc::now();
        let stories: Vec<story::Model> = self
            .story_repo
            .find_active_by_authors(&author_ids, now)
            .await?
            .into_iter()
            .filter(|s| can_view_story(&audience, s, now))
            .collect();

        self.details(stories).await
    }

    /// Unexpired stories of `user_id` that the viewer may see.
    pub async fn by_user(&self, viewer_id: &str, user_id: &str) -> AppResult<Vec<StoryDetail>> {
        self.user_repo.get_by_id(user_id).await?;
        let audience = Audience::load(&self.following_repo, viewer_id).await?;

        if !audience.is_viewer(user_id) && !audience.is_mutual(user_id) {
            return Ok(vec![]);
        }

        let now = Utc::now();
        let stories: Vec<story::Model> = self
            .story_repo
            .find_active_by_authors(&[user_id.to_string()], now)
            .await?
            .into_iter()
            .filter(|s| can_view_story(&audience, s, now))
            .collect();

        self.details(stories).await
    }

    /// A single story, if the viewer may see it.
    pub async fn get(&self, viewer_id: &str, story_id: &str) -> AppResult<StoryDetail> {
        let story = self.visible_story(viewer_id, story_id).await?;
        self.details(vec![story])
            .await?
            .pop()
            .ok_or_else(|| AppError::StoryNotFound(story_id.to_string()))
    }

    /// Post a story.
    pub async fn create(&self, author_id: &str, input: CreateStoryInput) -> AppResult<StoryDetail> {
        input.validate()?;

        let author = self.user_repo.get_by_id(author_id).await?;
        let now = Utc::now();

        let model = story::ActiveModel {
            id: Set(self.id_gen.generate()),
            author_id: Set(author_id.to_string()),
            media_type: Set(input.media_type),
            media_url: Set(input.media_url),
            caption: Set(input.caption),
            created_at: Set(now.into()),
            expires_at: Set((now + self.ttl).into()),
        };
        let story = self.story_repo.create(model).await?;

        tracing::debug!(story_id = %story.id, author_id = %author_id, "Created story");

        Ok(StoryDetail {
            story,
            author,
            views: vec![],
            reactions: vec![],
        })
    }

    /// Record that the viewer saw a story. Repeat views are ignored.
    ///
    /// The author's own views are recorded like anyone else's.
    pub async fn view(&self, viewer_id: &str, story_id: &str) -> AppResult<()> {
        self.visible_story(viewer_id, story_id).await?;

        if self
            .story_repo
            .find_view(story_id, viewer_id)
            .await?
            .is_some()
        {
            return Ok(());
        }

        let model = story_view::ActiveModel {
            id: Set(self.id_gen.generate()),
            story_id: Set(story_id.to_string()),
            viewer_id: Set(viewer_id.to_string()),
            viewed_at: Set(Utc::now().into()),
        };
        self.story_repo.create_view(model).await?;
        Ok(())
    }

    /// React to a story, replacing the viewer's previous reaction.
    pub async fn react(
        &self,
        viewer_id: &str,
        story_id: &str,
        input: ReactInput,
    ) -> AppResult<story_reaction::Model> {
        input.validate()?;
        self.visible_story(viewer_id, story_id).await?;

        let now = Utc::now();
        match self.story_repo.find_reaction(story_id, viewer_id).await? {
            Some(existing) => {
                let mut active: story_reaction::ActiveModel = existing.into();
                active.emoji = Set(input.emoji);
                active.created_at = Set(now.into());
                self.story_repo.update_reaction(active).await
            }
            None => {
                let model = story_reaction::ActiveModel {
                    id: Set(self.id_gen.generate()),
                    story_id: Set(story_id.to_string()),
                    user_id: Set(viewer_id.to_string()),
                    emoji: Set(input.emoji),
                    created_at: Set(now.into()),
                };
                self.story_repo.create_reaction(model).await
            }
        }
    }

    /// Reply to a story through a chat message to its author.
    ///
    /// Only mutual follows may reply, and never to their own story.
    pub async fn reply(
        &self,
        viewer_id: &str,
        story_id: &str,
        input: StoryReplyInput,
    ) -> AppResult<MessageDetail> {
        input.validate()?;

        let story = self.unexpired_story(story_id).await?;
        let audience = Audience::load(&self.following_repo, viewer_id).await?;
        check_story_reply(&audience, &story)?;

        let detail = self
            .messaging
            .story_reply(viewer_id, &story, input.content.trim().to_string())
            .await?;

        tracing::debug!(story_id = %story_id, message_id = %detail.message.id, "Story reply sent");
        Ok(detail)
    }

    /// Delete a story. Only the author may delete it.
    pub async fn delete(&self, viewer_id: &str, story_id: &str) -> AppResult<()> {
        let story = self
            .story_repo
            .find_by_id(story_id)
            .await?
            .ok_or_else(|| AppError::StoryNotFound(story_id.to_string()))?;

        if story.author_id != viewer_id {
            return Err(AppError::Forbidden("Not authorized".to_string()));
        }

        self.story_repo.delete(story).await
    }

    async fn unexpired_story(&self, story_id: &str) -> AppResult<story::Model> {
        self.story_repo
            .find_by_id(story_id)
            .await?
            .filter(|s| s.expires_at.with_timezone(&Utc) > Utc::now())
            .ok_or_else(|| AppError::StoryNotFound(story_id.to_string()))
    }

    async fn visible_story(&self, viewer_id: &str, story_id: &str) -> AppResult<story::Model> {
        let story = self.unexpired_story(story_id).await?;
        let audience = Audience::load(&self.following_repo, viewer_id).await?;

        if !can_view_story(&audience, &story, Utc::now()) {
            return Err(AppError::StoryNotFound(story_id.to_string()));
        }
        Ok(story)
    }

    async fn details(&self, stories: Vec<story::Model>) -> AppResult<Vec<StoryDetail>> {
        if stories.is_empty() {
            return Ok(vec![]);
        }

        let ids: Vec<String> = stories.iter().map(|s| s.id.clone()).collect();
        let mut author_ids: Vec<String> = stories.iter().map(|s| s.author_id.clone()).collect();
        author_ids.sort();
        author_ids.dedup();

        let authors: HashMap<String, user::Model> = self
            .user_repo
            .find_by_ids(&author_ids)
            .await?
            .into_iter()
            .map(|u| (u.id.clone(), u))
            .collect();

        let mut views: HashMap<String, Vec<story_view::Model>> = HashMap::new();
        for view in self.story_repo.find_views_for_stories(&ids).await? {
            views.entry(view.story_id.clone()).or_default().push(view);
        }
        let mut reactions: HashMap<String, Vec<story_reaction::Model>> = HashMap::new();
        for reaction in self.story_repo.find_reactions_for_stories(&ids).await? {
            reactions
                .entry(reaction.story_id.clone())
                .or_default()
                .push(reaction);
        }

        let mut details: Vec<StoryDetail> = stories
            .into_iter()
            .filter_map(|story| {
                let author = authors.get(&story.author_id)?.clone();
                Some(StoryDetail {
                    views: views.remove(&story.id).unwrap_or_default(),
                    reactions: reactions.remove(&story.id).unwrap_or_default(),
                    story,
                    author,
                })
            })
            .collect();

        details.sort_by(|a, b| b.story.created_at.cmp(&a.story.created_at));
        Ok(details)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::services::live_relay::NoOpLiveRelay;
    use pulse_db::{
        entities::following,
        repositories::{ConversationRepository, MessageRepository, UserPrivacyRepository},
    };
    use sea_orm::{DatabaseBackend, MockDatabase};
    use std::sync::Arc;

    fn mock() -> MockDatabase {
        MockDatabase::new(DatabaseBackend::Postgres)
    }

    fn conn(db: MockDatabase) -> Arc<sea_orm::DatabaseConnection> {
        Arc::new(db.into_connection())
    }

    fn service(story_db: MockDatabase, user_db: MockDatabase, following_db: MockDatabase) -> StoryService {
        service_over(conn(story_db), user_db, following_db)
    }

    fn service_over(
        story_db: Arc<sea_orm::DatabaseConnection>,
        user_db: MockDatabase,
        following_db: MockDatabase,
    ) -> StoryService {
        let messaging = MessagingService::new(
            ConversationRepository::new(conn(mock())),
            MessageRepository::new(conn(mock())),
            UserRepository::new(conn(mock())),
            UserPrivacyRepository::new(conn(mock())),
            FollowingRepository::new(conn(mock())),
            Arc::new(NoOpLiveRelay),
        );
        StoryService::new(
            StoryRepository::new(story_db),
            UserRepository::new(conn(user_db)),
            FollowingRepository::new(conn(following_db)),
            messaging,
            Duration::hours(24),
        )
    }

    fn create_test_story(id: &str, author_id: &str, expires_in: Duration) -> story::Model {
        let now = Utc::now();
        story::Model {
            id: id.to_string(),
            author_id: author_id.to_string(),
            media_type: story::MediaType::Image,
            media_url: "https://cdn.example.com/s.jpg".to_string(),
            caption: None,
            created_at: now.into(),
            expires_at: (now + expires_in).into(),
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

    fn create_test_view(story_id: &str, viewer_id: &str) -> story_view::Model {
        story_view::Model {
            id: format!("{story_id}-{viewer_id}"),
            story_id: story_id.to_string(),
            viewer_id: viewer_id.to_string(),
            viewed_at: Utc::now().into(),
        }
    }

    fn create_test_reaction(story_id: &str, user_id: &str, emoji: &str) -> story_reaction::Model {
        story_reaction::Model {
            id: format!("{story_id}-{user_id}"),
            story_id: story_id.to_string(),
            user_id: user_id.to_string(),
            emoji: emoji.to_string(),
            created_at: Utc::now().into(),
        }
    }

    /// Follow rows making `a` and `b` mutuals, as loaded for viewer `a`.
    fn mutual(a: &str, b: &str) -> MockDatabase {
        mock()
            .append_query_results([[follow_row(a, b)]])
            .append_query_results([[follow_row(b, a)]])
    }

    fn reply(content: &str) -> StoryReplyInput {
        StoryReplyInput {
            content: content.to_string(),
        }
    }

    #[tokio::test]
    async fn test_reply_to_own_story_rejected() {
        let service = service(
            mock().append_query_results([[create_test_story("s1", "a", Duration::hours(1))]]),
            mock(),
            mock()
                .append_query_results([Vec::<following::Model>::new()])
                .append_query_results([Vec::<following::Model>::new()]),
        );

        match service.reply("a", "s1", reply("nice")).await {
            Err(AppError::BadRequest(msg)) => assert_eq!(msg, "Cannot reply to your own story"),
            other => panic!("Expected BadRequest, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_reply_requires_mutual_follow() {
        // a follows b, but b does not follow a
        let service = service(
            mock().append_query_results([[create_test_story("s1", "b", Duration::hours(1))]]),
            mock(),
            mock()
                .append_query_results([[follow_row("a", "b")]])
                .append_query_results([Vec::<following::Model>::new()]),
        );

        match service.reply("a", "s1", reply("nice")).await {
            Err(AppError::Forbidden(msg)) => {
                assert_eq!(msg, "You can only reply to stories from mutual follows");
            }
            other => panic!("Expected Forbidden, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_expired_story_is_not_found() {
        let service = service(
            mock().append_query_results([[create_test_story("s1", "b", Duration::hours(-1))]]),
            mock(),
            mock(),
        );

        let result = service.get("a", "s1").await;
        assert!(matches!(result, Err(AppError::StoryNotFound(_))));
    }

    #[tokio::test]
    async fn test_get_story_of_non_mutual_is_not_found() {
        let service = service(
            mock().append_query_results([[create_test_story("s1", "b", Duration::hours(1))]]),
            mock(),
            mock()
                .append_query_results([[follow_row("a", "b")]])
                .append_query_results([Vec::<following::Model>::new()]),
        );

        let result = service.get("a", "s1").await;
        assert!(matches!(result, Err(AppError::StoryNotFound(_))));
    }

    #[tokio::test]
    async fn test_delete_by_non_author_forbidden() {
        let service = service(
            mock().append_query_results([[create_test_story("s1", "b", Duration::hours(1))]]),
            mock(),
            mock(),
        );

        match service.delete("a", "s1").await {
            Err(AppError::Forbidden(msg)) => assert_eq!(msg, "Not authorized"),
            other => panic!("Expected Forbidden, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_feed_with_no_mutuals_only_loads_own() {
        let service = service(
            mock().append_query_results([Vec::<story::Model>::new()]),
            mock(),
            mock()
                .append_query_results([[follow_row("a", "b")]])
                .append_query_results([Vec::<following::Model>::new()]),
        );

        assert!(service.feed("a").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_feed_includes_mutual_and_skips_one_way_follow() {
        // a and b are mutuals; a follows c, c does not follow back
        let following_db = mock()
            .append_query_results([[follow_row("a", "b"), follow_row("a", "c")]])
            .append_query_results([[follow_row("b", "a")]]);
        let service = service(
            mock()
                .append_query_results([[
                    create_test_story("s-b", "b", Duration::hours(1)),
                    create_test_story("s-c", "c", Duration::hours(1)),
                ]])
                .append_query_results([Vec::<story_view::Model>::new()])
                .append_query_results([Vec::<story_reaction::Model>::new()]),
            mock().append_query_results([[create_test_user("b")]]),
            following_db,
        );

        let feed = service.feed("a").await.unwrap();

        assert_eq!(feed.len(), 1);
        assert_eq!(feed[0].story.id, "s-b");
        assert_eq!(feed[0].author.id, "b");
    }

    #[tokio::test]
    async fn test_first_view_is_recorded() {
        let story_db = conn(
            mock()
                .append_query_results([[create_test_story("s1", "b", Duration::hours(1))]])
                .append_query_results([Vec::<story_view::Model>::new()])
                .append_query_results([[create_test_view("s1", "a")]]),
        );
        let service = service_over(story_db.clone(), mock(), mutual("a", "b"));

        service.view("a", "s1").await.unwrap();

        drop(service);
        let log = Arc::try_unwrap(story_db).unwrap().into_transaction_log();
        assert_eq!(log.len(), 3);
    }

    #[tokio::test]
    async fn test_repeat_view_inserts_nothing() {
        let story_db = conn(
            mock()
                .append_query_results([[create_test_story("s1", "b", Duration::hours(1))]])
                .append_query_results([[create_test_view("s1", "a")]]),
        );
        let service = service_over(story_db.clone(), mock(), mutual("a", "b"));

        service.view("a", "s1").await.unwrap();

        drop(service);
        // story lookup and view lookup only
        let log = Arc::try_unwrap(story_db).unwrap().into_transaction_log();
        assert_eq!(log.len(), 2);
    }

    #[tokio::test]
    async fn test_author_view_is_recorded() {
        let no_follows = mock()
            .append_query_results([Vec::<following::Model>::new()])
            .append_query_results([Vec::<following::Model>::new()]);
        let story_db = conn(
            mock()
                .append_query_results([[create_test_story("s1", "b", Duration::hours(1))]])
                .append_query_results([Vec::<story_view::Model>::new()])
                .append_query_results([[create_test_view("s1", "b")]]),
        );
        let service = service_over(story_db.clone(), mock(), no_follows);

        service.view("b", "s1").await.unwrap();

        drop(service);
        let log = Arc::try_unwrap(story_db).unwrap().into_transaction_log();
        assert_eq!(log.len(), 3);
    }

    #[tokio::test]
    async fn test_second_reaction_replaces_first() {
        let story_db = conn(
            mock()
                .append_query_results([[create_test_story("s1", "b", Duration::hours(1))]])
                .append_query_results([[create_test_reaction("s1", "a", "🔥")]])
                .append_query_results([[create_test_reaction("s1", "a", "😍")]]),
        );
        let service = service_over(story_db.clone(), mock(), mutual("a", "b"));

        let reaction = service
            .react(
                "a",
                "s1",
                ReactInput {
                    emoji: "😍".to_string(),
                },
            )
            .await
            .unwrap();

        assert_eq!(reaction.id, "s1-a");
        assert_eq!(reaction.emoji, "😍");
        drop(service);
        let log = Arc::try_unwrap(story_db).unwrap().into_transaction_log();
        assert_eq!(log.len(), 3);
        let last = format!("{:?}", log[2]);
        assert!(last.contains("UPDATE"));
        assert!(!last.contains("INSERT"));
    }
}
