//! Visibility policy.
//!
//! Decides, per viewer, which posts, stories and message threads are
//! reachable. Everything here except [`Audience::load`] is pure so the rules
//! can be tested without a database.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use pulse_common::{AppError, AppResult};
use pulse_db::{
    entities::{
        post, story, user,
        user_privacy::{self, AllowMessagesFrom},
    },
    repositories::FollowingRepository,
};
use serde::Serialize;

/// Effective privacy configuration of a user.
///
/// Users without a stored settings row get the public defaults.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PrivacySettings {
    pub is_private: bool,
    pub allow_messages_from: AllowMessagesFrom,
}

impl PrivacySettings {
    /// Settings from an optional stored row.
    #[must_use]
    pub fn of(row: Option<&user_privacy::Model>) -> Self {
        row.map(Self::from).unwrap_or_default()
    }

    /// Index stored rows by user ID.
    #[must_use]
    pub fn index(rows: Vec<user_privacy::Model>) -> HashMap<String, Self> {
        rows.into_iter()
            .map(|row| {
                let settings = Self::from(&row);
                (row.user_id, settings)
            })
            .collect()
    }
}

impl From<&user_privacy::Model> for PrivacySettings {
    fn from(row: &user_privacy::Model) -> Self {
        Self {
            is_private: row.is_private,
            allow_messages_from: row.allow_messages_from,
        }
    }
}

/// The follow relationships of one viewer.
#[derive(Debug, Clone)]
pub struct Audience {
    viewer_id: String,
    following: HashSet<String>,
    followers: HashSet<String>,
}

impl Audience {
    /// Build an audience from explicit follow sets.
    pub fn new(
        viewer_id: impl Into<String>,
        following: impl IntoIterator<Item = String>,
        followers: impl IntoIterator<Item = String>,
    ) -> Self {
        Self {
            viewer_id: viewer_id.into(),
            following: following.into_iter().collect(),
            followers: followers.into_iter().collect(),
        }
    }

    /// Load the follow sets of `viewer_id`.
    pub async fn load(repo: &FollowingRepository, viewer_id: &str) -> AppResult<Self> {
        let following = repo.find_followee_ids(viewer_id).await?;
        let followers = repo.find_follower_ids(viewer_id).await?;
        Ok(Self::new(viewer_id, following, followers))
    }

    /// The viewer this audience belongs to.
    #[must_use]
    pub fn viewer_id(&self) -> &str {
        &self.viewer_id
    }

    /// Whether `user_id` is the viewer.
    #[must_use]
    pub fn is_viewer(&self, user_id: &str) -> bool {
        self.viewer_id == user_id
    }

    /// Viewer follows `user_id` (the viewer is in their follower set).
    #[must_use]
    pub fn follows(&self, user_id: &str) -> bool {
        self.following.contains(user_id)
    }

    /// `user_id` follows the viewer.
    #[must_use]
    pub fn is_followed_by(&self, user_id: &str) -> bool {
        self.followers.contains(user_id)
    }

    /// Each of the viewer and `user_id` follows the other.
    #[must_use]
    pub fn is_mutual(&self, user_id: &str) -> bool {
        self.follows(user_id) && self.is_followed_by(user_id)
    }

    /// IDs in a mutual follow with the viewer.
    #[must_use]
    pub fn mutual_ids(&self) -> Vec<String> {
        self.following
            .intersection(&self.followers)
            .cloned()
            .collect()
    }
}

/// Whether the viewer may see a post by `author_id`.
#[must_use]
pub fn can_view_post(audience: &Audience, author_id: &str, author_privacy: &PrivacySettings) -> bool {
    audience.is_viewer(author_id) || !author_privacy.is_private || audience.follows(author_id)
}

/// Whether the viewer may see a story: unexpired, and own or from a mutual follow.
#[must_use]
pub fn can_view_story(audience: &Audience, story: &story::Model, now: DateTime<Utc>) -> bool {
    story.expires_at.with_timezone(&Utc) > now
        && (audience.is_viewer(&story.author_id) || audience.is_mutual(&story.author_id))
}

/// Check the recipient's message policy.
///
/// `following` admits a sender only when the recipient follows the sender.
pub fn check_message_permission(
    recipient_privacy: &PrivacySettings,
    recipient_follows_sender: bool,
) -> AppResult<()> {
    match recipient_privacy.allow_messages_from {
        AllowMessagesFrom::Everyone => Ok(()),
        AllowMessagesFrom::Following if recipient_follows_sender => Ok(()),
        AllowMessagesFrom::Following => Err(AppError::Forbidden(
            "This user only accepts messages from people they follow".to_string(),
        )),
        AllowMessagesFrom::Nobody => Err(AppError::Forbidden(
            "This user does not accept messages".to_string(),
        )),
    }
}

/// Check that the viewer may reply to `story`.
pub fn check_story_reply(audience: &Audience, story: &story::Model) -> AppResult<()> {
    if audience.is_viewer(&story.author_id) {
        return Err(AppError::BadRequest(
            "Cannot reply to your own story".to_string(),
        ));
    }
    if !audience.is_mutual(&story.author_id) {
        return Err(AppError::Forbidden(
            "You can only reply to stories from mutual follows".to_string(),
        ));
    }
    Ok(())
}

/// Filter posts down to what the viewer may see, newest first.
///
/// Posts whose author is missing from `authors` are dropped. Authors
/// missing from `privacy` get the public defaults.
#[must_use]
pub fn compose_feed(
    posts: Vec<post::Model>,
    authors: &HashMap<String, user::Model>,
    privacy: &HashMap<String, PrivacySettings>,
    audience: &Audience,
) -> Vec<(post::Model, user::Model)> {
    let mut visible: Vec<(post::Model, user::Model)> = posts
        .into_iter()
        .filter_map(|post| {
            let author = authors.get(&post.author_id)?;
            let settings = privacy.get(&post.author_id).copied().unwrap_or_default();
            can_view_post(audience, &post.author_id, &settings).then(|| (post, author.clone()))
        })
        .collect();

    visible.sort_by(|a, b| b.0.created_at.cmp(&a.0.created_at));
    visible
}

/// One page of an already filtered listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u64,
    pub limit: u64,
    pub total: u64,
    pub has_more: bool,
}

/// Slice `items` into 1-based page `page` of size `limit`.
#[must_use]
pub fn paginate<T>(items: Vec<T>, page: u64, limit: u64) -> Page<T> {
    let page = page.max(1);
    let limit = limit.max(1);
    let total = items.len() as u64;
    let skip = (page - 1).saturating_mul(limit);

    let items: Vec<T> = items
        .into_iter()
        .skip(usize::try_from(skip).unwrap_or(usize::MAX))
        .take(usize::try_from(limit).unwrap_or(usize::MAX))
        .collect();
    let has_more = skip + (items.len() as u64) < total;

    Page {
        items,
        page,
        limit,
        total,
        has_more,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn user(id: &str) -> user::Model {
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

    fn post_at(id: &str, author: &str, minute: u32) -> post::Model {
        post::Model {
            id: id.to_string(),
            author_id: author.to_string(),
            content: format!("post {id}"),
            media_url: None,
            kind: post::PostKind::Post,
            created_at: Utc
                .with_ymd_and_hms(2025, 1, 1, 12, minute, 0)
                .unwrap()
                .into(),
        }
    }

    fn story_by(author: &str, expires_in: Duration) -> story::Model {
        let now = Utc::now();
        story::Model {
            id: format!("s-{author}"),
            author_id: author.to_string(),
            media_type: story::MediaType::Image,
            media_url: "https://cdn.example.com/s.jpg".to_string(),
            caption: None,
            created_at: now.into(),
            expires_at: (now + expires_in).into(),
        }
    }

    fn private() -> PrivacySettings {
        PrivacySettings {
            is_private: true,
            allow_messages_from: AllowMessagesFrom::Everyone,
        }
    }

    fn authors(ids: &[&str]) -> HashMap<String, user::Model> {
        ids.iter().map(|id| ((*id).to_string(), user(id))).collect()
    }

    #[test]
    fn test_private_post_visible_only_to_author_and_followers() {
        // a is private, b follows a, c does not
        let a = Audience::new("a", vec![], vec!["b".to_string()]);
        let b = Audience::new("b", vec!["a".to_string()], vec![]);
        let c = Audience::new("c", vec![], vec![]);

        assert!(can_view_post(&a, "a", &private()));
        assert!(can_view_post(&b, "a", &private()));
        assert!(!can_view_post(&c, "a", &private()));
    }

    #[test]
    fn test_missing_privacy_row_is_public() {
        let settings = PrivacySettings::of(None);
        let stranger = Audience::new("z", vec![], vec![]);

        assert!(!settings.is_private);
        assert_eq!(settings.allow_messages_from, AllowMessagesFrom::Everyone);
        assert!(can_view_post(&stranger, "a", &settings));
    }

    #[test]
    fn test_feed_scenario_private_author() {
        let posts = vec![post_at("p", "a", 0)];
        let authors = authors(&["a"]);
        let privacy = HashMap::from([("a".to_string(), private())]);

        let as_c = compose_feed(
            posts.clone(),
            &authors,
            &privacy,
            &Audience::new("c", vec![], vec![]),
        );
        let as_b = compose_feed(
            posts.clone(),
            &authors,
            &privacy,
            &Audience::new("b", vec!["a".to_string()], vec![]),
        );
        let as_a = compose_feed(
            posts,
            &authors,
            &privacy,
            &Audience::new("a", vec![], vec!["b".to_string()]),
        );

        assert!(as_c.is_empty());
        assert_eq!(as_b.len(), 1);
        assert_eq!(as_a[0].0.id, "p");
    }

    #[test]
    fn test_feed_drops_orphans_and_sorts_newest_first() {
        let posts = vec![
            post_at("old", "a", 1),
            post_at("orphan", "ghost", 30),
            post_at("new", "b", 20),
        ];
        let feed = compose_feed(
            posts,
            &authors(&["a", "b"]),
            &HashMap::new(),
            &Audience::new("v", vec![], vec![]),
        );

        let ids: Vec<_> = feed.iter().map(|(p, _)| p.id.as_str()).collect();
        assert_eq!(ids, vec!["new", "old"]);
    }

    #[test]
    fn test_mutual_requires_both_directions() {
        let audience = Audience::new(
            "a",
            vec!["b".to_string(), "c".to_string()],
            vec!["b".to_string(), "d".to_string()],
        );

        assert!(audience.is_mutual("b"));
        assert!(!audience.is_mutual("c"));
        assert!(!audience.is_mutual("d"));
        assert_eq!(audience.mutual_ids(), vec!["b".to_string()]);
    }

    #[test]
    fn test_story_visibility() {
        let now = Utc::now();
        let audience = Audience::new("a", vec!["b".to_string()], vec!["b".to_string()]);

        assert!(can_view_story(&audience, &story_by("b", Duration::hours(1)), now));
        assert!(can_view_story(&audience, &story_by("a", Duration::hours(1)), now));
        // expired stories are hidden even from mutual follows
        assert!(!can_view_story(&audience, &story_by("b", Duration::hours(-1)), now));
        assert!(!can_view_story(&audience, &story_by("c", Duration::hours(1)), now));
    }

    #[test]
    fn test_story_reply_rules() {
        let audience = Audience::new("a", vec!["b".to_string(), "c".to_string()], vec!["b".to_string()]);

        assert!(matches!(
            check_story_reply(&audience, &story_by("a", Duration::hours(1))),
            Err(AppError::BadRequest(_))
        ));
        assert!(matches!(
            check_story_reply(&audience, &story_by("c", Duration::hours(1))),
            Err(AppError::Forbidden(_))
        ));
        assert!(check_story_reply(&audience, &story_by("b", Duration::hours(1))).is_ok());
    }

    #[test]
    fn test_message_permission() {
        let everyone = PrivacySettings::default();
        let following = PrivacySettings {
            is_private: false,
            allow_messages_from: AllowMessagesFrom::Following,
        };
        let nobody = PrivacySettings {
            is_private: false,
            allow_messages_from: AllowMessagesFrom::Nobody,
        };

        assert!(check_message_permission(&everyone, false).is_ok());
        assert!(check_message_permission(&following, true).is_ok());
        assert!(matches!(
            check_message_permission(&following, false),
            Err(AppError::Forbidden(_))
        ));
        assert!(matches!(
            check_message_permission(&nobody, true),
            Err(AppError::Forbidden(_))
        ));
    }

    #[test]
    fn test_paginate() {
        let items: Vec<u32> = (0..25).collect();

        let first = paginate(items.clone(), 1, 10);
        assert_eq!(first.items, (0..10).collect::<Vec<_>>());
        assert!(first.has_more);
        assert_eq!(first.total, 25);

        let last = paginate(items.clone(), 3, 10);
        assert_eq!(last.items, (20..25).collect::<Vec<_>>());
        assert!(!last.has_more);

        let beyond = paginate(items, 9, 10);
        assert!(beyond.items.is_empty());
        assert!(!beyond.has_more);
    }
}
