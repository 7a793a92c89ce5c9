//! API response types.
//!
//! Entities are never serialized directly: these shapes drop credentials,
//! one-time codes and privacy internals before anything leaves the server.

#![allow(missing_docs)]

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, FixedOffset};
use pulse_core::{
    AuthSession, CommentNode, ConversationSummary, MessageDetail, NotificationDetail, PostDetail,
    Profile, StoryDetail,
};
use pulse_db::entities::{
    message, message::MessageType, notification::NotificationKind, post::PostKind,
    story::MediaType, story_reaction, story_view, user,
};
use serde::Serialize;

/// `201 Created` with a JSON body.
pub struct Created<T>(pub T);

impl<T: Serialize> IntoResponse for Created<T> {
    fn into_response(self) -> Response {
        (StatusCode::CREATED, Json(self.0)).into_response()
    }
}

/// Plain `{ "message": ... }` body.
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// `{ "count": n }` body.
#[derive(Debug, Serialize)]
pub struct CountResponse {
    pub count: u64,
}

/// Public view of a user.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: String,
    pub username: String,
    pub bio: Option<String>,
    pub profile_picture: Option<String>,
}

impl From<&user::Model> for UserSummary {
    fn from(user: &user::Model) -> Self {
        Self {
            id: user.id.clone(),
            username: user.username.clone(),
            bio: user.bio.clone(),
            profile_picture: user.profile_picture.clone(),
        }
    }
}

/// The caller's own account.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountResponse {
    #[serde(flatten)]
    pub summary: UserSummary,
    pub email: String,
    pub email_verified: bool,
    pub created_at: DateTime<FixedOffset>,
}

impl From<&user::Model> for AccountResponse {
    fn from(user: &user::Model) -> Self {
        Self {
            summary: user.into(),
            email: user.email.clone(),
            email_verified: user.email_verified,
            created_at: user.created_at,
        }
    }
}

/// Token plus the signed-in account.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: AccountResponse,
}

impl From<AuthSession> for AuthResponse {
    fn from(session: AuthSession) -> Self {
        Self {
            token: session.token,
            user: (&session.user).into(),
        }
    }
}

/// A profile with both sides of the follow graph.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileResponse {
    #[serde(flatten)]
    pub summary: UserSummary,
    /// Only present on the caller's own profile.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email_verified: Option<bool>,
    pub followers: Vec<String>,
    pub following: Vec<String>,
    pub is_private: bool,
    pub created_at: DateTime<FixedOffset>,
}

impl ProfileResponse {
    /// Profile as seen by its owner.
    #[must_use]
    pub fn own(profile: Profile) -> Self {
        let email = Some(profile.user.email.clone());
        let email_verified = Some(profile.user.email_verified);
        Self {
            email,
            email_verified,
            ..Self::public(profile)
        }
    }

    /// Profile as seen by anyone else.
    #[must_use]
    pub fn public(profile: Profile) -> Self {
        Self {
            summary: (&profile.user).into(),
            email: None,
            email_verified: None,
            followers: profile.follower_ids,
            following: profile.following_ids,
            is_private: profile.privacy.is_private,
            created_at: profile.user.created_at,
        }
    }
}

/// Post with author, likers and comment count.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostResponse {
    pub id: String,
    pub author: UserSummary,
    pub content: String,
    pub media_url: Option<String>,
    pub post_type: PostKind,
    pub likes: Vec<String>,
    pub comment_count: u64,
    pub created_at: DateTime<FixedOffset>,
}

impl From<PostDetail> for PostResponse {
    fn from(detail: PostDetail) -> Self {
        Self {
            author: (&detail.author).into(),
            id: detail.post.id,
            content: detail.post.content,
            media_url: detail.post.media_url,
            post_type: detail.post.kind,
            likes: detail.likes,
            comment_count: detail.comment_count,
            created_at: detail.post.created_at,
        }
    }
}

/// Comment with its nested replies.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentResponse {
    pub id: String,
    pub post_id: String,
    pub author: UserSummary,
    pub content: String,
    pub parent_comment: Option<String>,
    pub replies: Vec<CommentResponse>,
    pub created_at: DateTime<FixedOffset>,
}

impl From<CommentNode> for CommentResponse {
    fn from(node: CommentNode) -> Self {
        Self {
            author: (&node.author).into(),
            id: node.comment.id,
            post_id: node.comment.post_id,
            content: node.comment.content,
            parent_comment: node.comment.parent_id,
            replies: node.replies.into_iter().map(Self::from).collect(),
            created_at: node.comment.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoryViewResponse {
    pub user_id: String,
    pub viewed_at: DateTime<FixedOffset>,
}

impl From<story_view::Model> for StoryViewResponse {
    fn from(view: story_view::Model) -> Self {
        Self {
            user_id: view.viewer_id,
            viewed_at: view.viewed_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoryReactionResponse {
    pub user_id: String,
    pub emoji: String,
    pub created_at: DateTime<FixedOffset>,
}

impl From<story_reaction::Model> for StoryReactionResponse {
    fn from(reaction: story_reaction::Model) -> Self {
        Self {
            user_id: reaction.user_id,
            emoji: reaction.emoji,
            created_at: reaction.created_at,
        }
    }
}

/// Story with its views and reactions.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoryResponse {
    pub id: String,
    pub author: UserSummary,
    pub media_type: MediaType,
    pub media_url: String,
    pub caption: Option<String>,
    pub views: Vec<StoryViewResponse>,
    pub reactions: Vec<StoryReactionResponse>,
    pub created_at: DateTime<FixedOffset>,
    pub expires_at: DateTime<FixedOffset>,
}

impl From<StoryDetail> for StoryResponse {
    fn from(detail: StoryDetail) -> Self {
        Self {
            author: (&detail.author).into(),
            id: detail.story.id,
            media_type: detail.story.media_type,
            media_url: detail.story.media_url,
            caption: detail.story.caption,
            views: detail.views.into_iter().map(Into::into).collect(),
            reactions: detail.reactions.into_iter().map(Into::into).collect(),
            created_at: detail.story.created_at,
            expires_at: detail.story.expires_at,
        }
    }
}

/// The story a `story_reply` message points at.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoryReference {
    pub story_id: String,
    pub thumbnail: Option<String>,
    pub author_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadReceipt {
    pub user_id: String,
    pub read_at: DateTime<FixedOffset>,
}

/// A chat message, as returned over REST and pushed over the live relay.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessageResponse {
    pub id: String,
    pub conversation_id: String,
    pub sender_id: String,
    pub sender: Option<UserSummary>,
    pub content: String,
    pub message_type: MessageType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub story: Option<StoryReference>,
    pub read_by: Vec<ReadReceipt>,
    pub created_at: DateTime<FixedOffset>,
}

impl From<&MessageDetail> for ChatMessageResponse {
    fn from(detail: &MessageDetail) -> Self {
        let message = &detail.message;
        Self {
            id: message.id.clone(),
            conversation_id: message.conversation_id.clone(),
            sender_id: message.sender_id.clone(),
            sender: detail.sender.as_ref().map(UserSummary::from),
            content: message.content.clone(),
            message_type: message.message_type,
            story: story_reference(message),
            read_by: detail
                .read_by
                .iter()
                .map(|r| ReadReceipt {
                    user_id: r.user_id.clone(),
                    read_at: r.read_at,
                })
                .collect(),
            created_at: message.created_at,
        }
    }
}

fn story_reference(message: &message::Model) -> Option<StoryReference> {
    message.story_id.as_ref().map(|story_id| StoryReference {
        story_id: story_id.clone(),
        thumbnail: message.story_thumbnail.clone(),
        author_id: message.story_author_id.clone(),
    })
}

/// Last message preview in a conversation list.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LastMessage {
    pub id: String,
    pub sender_id: String,
    pub content: String,
    pub message_type: MessageType,
    pub created_at: DateTime<FixedOffset>,
}

/// Conversation with participants and the caller's unread count.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationResponse {
    pub id: String,
    pub participants: Vec<UserSummary>,
    pub last_message: Option<LastMessage>,
    pub last_message_at: Option<DateTime<FixedOffset>>,
    pub unread_count: u64,
    pub created_at: DateTime<FixedOffset>,
}

impl From<ConversationSummary> for ConversationResponse {
    fn from(summary: ConversationSummary) -> Self {
        Self {
            id: summary.conversation.id,
            participants: summary.participants.iter().map(UserSummary::from).collect(),
            last_message: summary.last_message.map(|m| LastMessage {
                id: m.id,
                sender_id: m.sender_id,
                content: m.content,
                message_type: m.message_type,
                created_at: m.created_at,
            }),
            last_message_at: summary.conversation.last_message_at,
            unread_count: summary.unread_count,
            created_at: summary.conversation.created_at,
        }
    }
}

/// Notification with the acting user.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationResponse {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub actor: Option<UserSummary>,
    pub post_id: Option<String>,
    pub message: String,
    pub is_read: bool,
    pub created_at: DateTime<FixedOffset>,
}

impl From<NotificationDetail> for NotificationResponse {
    fn from(detail: NotificationDetail) -> Self {
        Self {
            actor: detail.actor.as_ref().map(UserSummary::from),
            id: detail.notification.id,
            kind: detail.notification.kind,
            post_id: detail.notification.post_id,
            message: detail.notification.message,
            is_read: detail.notification.is_read,
            created_at: detail.notification.created_at,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Utc;
    use pulse_core::PrivacySettings;

    fn create_test_user() -> user::Model {
        user::Model {
            id: "u1".to_string(),
            username: "Alice".to_string(),
            username_lower: "alice".to_string(),
            email: "alice@example.com".to_string(),
            password_hash: "$argon2id$secret".to_string(),
            bio: Some("hi".to_string()),
            profile_picture: None,
            email_verified: true,
            otp_code: Some("123456".to_string()),
            otp_expires_at: None,
            created_at: Utc::now().into(),
            updated_at: None,
        }
    }

    #[test]
    fn test_account_response_hides_credentials() {
        let json = serde_json::to_value(AccountResponse::from(&create_test_user())).unwrap();

        assert_eq!(json["username"], "Alice");
        assert_eq!(json["email"], "alice@example.com");
        assert_eq!(json["emailVerified"], true);
        assert!(json.get("passwordHash").is_none());
        assert!(json.get("otpCode").is_none());
    }

    #[test]
    fn test_public_profile_omits_email() {
        let profile = Profile {
            user: create_test_user(),
            follower_ids: vec!["u2".to_string()],
            following_ids: vec![],
            privacy: PrivacySettings::default(),
        };

        let json = serde_json::to_value(ProfileResponse::public(profile)).unwrap();

        assert!(json.get("email").is_none());
        assert_eq!(json["followers"][0], "u2");
        assert_eq!(json["isPrivate"], false);
    }

    #[test]
    fn test_own_profile_includes_email() {
        let profile = Profile {
            user: create_test_user(),
            follower_ids: vec![],
            following_ids: vec![],
            privacy: PrivacySettings::default(),
        };

        let json = serde_json::to_value(ProfileResponse::own(profile)).unwrap();

        assert_eq!(json["email"], "alice@example.com");
        assert_eq!(json["profilePicture"], serde_json::Value::Null);
    }

    #[test]
    fn test_story_reply_message_carries_reference() {
        let detail = MessageDetail {
            message: message::Model {
                id: "m1".to_string(),
                conversation_id: "c1".to_string(),
                sender_id: "u2".to_string(),
                content: "nice".to_string(),
                message_type: MessageType::StoryReply,
                story_id: Some("s1".to_string()),
                story_thumbnail: Some("https://cdn.example/s1.jpg".to_string()),
                story_author_id: Some("u1".to_string()),
                created_at: Utc::now().into(),
            },
            sender: None,
            read_by: vec![],
        };

        let json = serde_json::to_value(ChatMessageResponse::from(&detail)).unwrap();

        assert_eq!(json["messageType"], "story_reply");
        assert_eq!(json["story"]["storyId"], "s1");
        assert_eq!(json["story"]["authorId"], "u1");
    }
}
