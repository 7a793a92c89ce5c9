//! Messaging service for direct conversations.
//!
//! Every send persists the message, moves the conversation's last-message
//! pointer, then hands the message to the live relay. Relay failures are
//! logged only; the stored message is the source of truth.

use std::collections::{HashMap, HashSet};

use chrono::Utc;
use pulse_common::{AppError, AppResult, IdGenerator};
use pulse_db::{
    entities::{
        conversation, message,
        message::MessageType,
        message_read, story, user,
        user_privacy::AllowMessagesFrom,
    },
    repositories::{
        ConversationRepository, FollowingRepository, MessageRepository, UserPrivacyRepository,
        UserRepository,
    },
};
use sea_orm::Set;
use serde::Deserialize;
use validator::Validate;

use crate::services::{
    live_relay::LiveRelayService,
    validation::{client_message_type, not_blank},
    visibility::{PrivacySettings, check_message_permission},
};

/// Input for sending a message into a conversation.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageInput {
    #[validate(length(max = 2000), custom(function = "not_blank"))]
    pub content: String,

    #[serde(default)]
    #[validate(custom(function = "client_message_type"))]
    pub message_type: Option<MessageType>,
}

/// Input for messaging a user directly.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct DirectMessageInput {
    #[validate(length(min = 1))]
    pub recipient_id: String,

    #[validate(length(max = 2000), custom(function = "not_blank"))]
    pub content: String,

    #[serde(default)]
    #[validate(custom(function = "client_message_type"))]
    pub message_type: Option<MessageType>,
}

/// A message with its sender and read receipts.
#[derive(Debug, Clone)]
pub struct MessageDetail {
    pub message: message::Model,
    pub sender: Option<user::Model>,
    pub read_by: Vec<message_read::Model>,
}

/// Conversation summary for listing.
#[derive(Debug, Clone)]
pub struct ConversationSummary {
    pub conversation: conversation::Model,
    pub participants: Vec<user::Model>,
    pub last_message: Option<message::Model>,
    pub unread_count: u64,
}

/// Messaging service.
#[derive(Clone)]
pub struct MessagingService {
    conversation_repo: ConversationRepository,
    message_repo: MessageRepository,
    user_repo: UserRepository,
    privacy_repo: UserPrivacyRepository,
    following_repo: FollowingRepository,
    relay: LiveRelayService,
    id_gen: IdGenerator,
}

impl MessagingService {
    /// Create a new messaging service.
    #[must_use]
    pub const fn new(
        conversation_repo: ConversationRepository,
        message_repo: MessageRepository,
        user_repo: UserRepository,
        privacy_repo: UserPrivacyRepository,
        following_repo: FollowingRepository,
        relay: LiveRelayService,
    ) -> Self {
        Self {
            conversation_repo,
            message_repo,
            user_repo,
            privacy_repo,
            following_repo,
            relay,
            id_gen: IdGenerator::new(),
        }
    }

    /// Conversations of the viewer, most recent activity first.
    pub async fn conversations(&self, viewer_id: &str) -> AppResult<Vec<ConversationSummary>> {
        let conversations = self.conversation_repo.find_by_participant(viewer_id).await?;
        self.summarize(viewer_id, conversations).await
    }

    /// Number of conversations holding at least one unread message.
    pub async fn unread_count(&self, viewer_id: &str) -> AppResult<u64> {
        let ids: Vec<String> = self
            .conversation_repo
            .find_by_participant(viewer_id)
            .await?
            .into_iter()
            .map(|c| c.id)
            .collect();

        let unread: HashSet<String> = self
            .message_repo
            .find_unread(&ids, viewer_id)
            .await?
            .into_iter()
            .map(|m| m.conversation_id)
            .collect();

        Ok(unread.len() as u64)
    }

    /// Find the conversation with `other_id`, creating it if needed.
    pub async fn get_or_create(
        &self,
        viewer_id: &str,
        other_id: &str,
    ) -> AppResult<ConversationSummary> {
        if viewer_id == other_id {
            return Err(AppError::BadRequest(
                "Cannot start a conversation with yourself".to_string(),
            ));
        }
        self.user_repo.get_by_id(other_id).await?;

        let conversation = self.find_or_create(viewer_id, other_id).await?;
        self.summarize(viewer_id, vec![conversation])
            .await?
            .pop()
            .ok_or_else(|| AppError::Internal("Conversation summary missing".to_string()))
    }

    /// Messages of a conversation, oldest first. Participants only.
    pub async fn messages(
        &self,
        viewer_id: &str,
        conversation_id: &str,
    ) -> AppResult<Vec<MessageDetail>> {
        let conversation = self.participant_conversation(viewer_id, conversation_id).await?;
        let messages = self
            .message_repo
            .find_by_conversation(&conversation.id)
            .await?;
        self.details(messages).await
    }

    /// Send a message into an existing conversation.
    pub async fn send(
        &self,
        viewer_id: &str,
        conversation_id: &str,
        input: SendMessageInput,
    ) -> AppResult<MessageDetail> {
        input.validate()?;

        let conversation = self.participant_conversation(viewer_id, conversation_id).await?;
        let recipient_id = conversation.other_participant(viewer_id).to_string();
        self.check_permission(viewer_id, &recipient_id).await?;

        self.deliver(
            conversation,
            viewer_id,
            input.content.trim().to_string(),
            input.message_type.unwrap_or_default(),
            None,
        )
        .await
    }

    /// Message a user, opening a conversation on first contact.
    ///
    /// The recipient's policy is checked first, so a rejected send leaves no
    /// conversation behind.
    pub async fn send_to_user(
        &self,
        viewer_id: &str,
        input: DirectMessageInput,
    ) -> AppResult<MessageDetail> {
        input.validate()?;

        if input.recipient_id == viewer_id {
            return Err(AppError::BadRequest(
                "Cannot send a message to yourself".to_string(),
            ));
        }
        self.user_repo.get_by_id(&input.recipient_id).await?;
        self.check_permission(viewer_id, &input.recipient_id).await?;

        let conversation = self.find_or_create(viewer_id, &input.recipient_id).await?;
        self.deliver(
            conversation,
            viewer_id,
            input.content.trim().to_string(),
            input.message_type.unwrap_or_default(),
            None,
        )
        .await
    }

    /// Send a reply to `story` as a chat message to its author.
    ///
    /// The caller is responsible for the story reply rules.
    pub async fn story_reply(
        &self,
        viewer_id: &str,
        story: &story::Model,
        content: String,
    ) -> AppResult<MessageDetail> {
        let conversation = self.find_or_create(viewer_id, &story.author_id).await?;
        self.deliver(
            conversation,
            viewer_id,
            content,
            MessageType::StoryReply,
            Some(story),
        )
        .await
    }

    /// Record read receipts for every message the viewer has not read.
    ///
    /// Returns the number of new receipts; repeating the call adds none.
    pub async fn mark_read(&self, viewer_id: &str, conversation_id: &str) -> AppResult<u64> {
        let conversation = self.participant_conversation(viewer_id, conversation_id).await?;

        let unread = self
            .message_repo
            .find_unread(&[conversation.id], viewer_id)
            .await?;

        let now = Utc::now();
        let reads = unread
            .into_iter()
            .map(|m| message_read::ActiveModel {
                id: Set(self.id_gen.generate()),
                message_id: Set(m.id),
                user_id: Set(viewer_id.to_string()),
                read_at: Set(now.into()),
            })
            .collect();

        self.message_repo.insert_reads(reads).await
    }

    async fn participant_conversation(
        &self,
        viewer_id: &str,
        conversation_id: &str,
    ) -> AppResult<conversation::Model> {
        let conversation = self.conversation_repo.get_by_id(conversation_id).await?;
        if !conversation.has_participant(viewer_id) {
            return Err(AppError::Forbidden("Not authorized".to_string()));
        }
        Ok(conversation)
    }

    async fn check_permission(&self, sender_id: &str, recipient_id: &str) -> AppResult<()> {
        let row = self.privacy_repo.find_by_user_id(recipient_id).await?;
        let privacy = PrivacySettings::of(row.as_ref());

        let recipient_follows_sender = match privacy.allow_messages_from {
            AllowMessagesFrom::Following => {
                self.following_repo
                    .is_following(recipient_id, sender_id)
                    .await?
            }
            AllowMessagesFrom::Everyone | AllowMessagesFrom::Nobody => false,
        };

        check_message_permission(&privacy, recipient_follows_sender)
    }

    async fn find_or_create(&self, user_a: &str, user_b: &str) -> AppResult<conversation::Model> {
        if let Some(existing) = self.conversation_repo.find_by_pair(user_a, user_b).await? {
            return Ok(existing);
        }

        let (first, second) = conversation::ordered_pair(user_a, user_b);
        let model = conversation::ActiveModel {
            id: Set(self.id_gen.generate()),
            participant_a: Set(first.to_string()),
            participant_b: Set(second.to_string()),
            last_message_id: Set(None),
            last_message_at: Set(None),
            created_at: Set(Utc::now().into()),
        };

        match self.conversation_repo.create(model).await {
            Ok(created) => Ok(created),
            // lost a race on the unique pair index
            Err(e) => self
                .conversation_repo
                .find_by_pair(user_a, user_b)
                .await?
                .ok_or(e),
        }
    }

    async fn deliver(
        &self,
        conversation: conversation::Model,
        sender_id: &str,
        content: String,
        message_type: MessageType,
        story: Option<&story::Model>,
    ) -> AppResult<MessageDetail> {
        let now = Utc::now();
        let recipient_id = conversation.other_participant(sender_id).to_string();

        let model = message::ActiveModel {
            id: Set(self.id_gen.generate()),
            conversation_id: Set(conversation.id.clone()),
            sender_id: Set(sender_id.to_string()),
            content: Set(content),
            message_type: Set(message_type),
            story_id: Set(story.map(|s| s.id.clone())),
            story_thumbnail: Set(story.map(|s| s.media_url.clone())),
            story_author_id: Set(story.map(|s| s.author_id.clone())),
            created_at: Set(now.into()),
        };
        let message = self.message_repo.create(model).await?;

        self.conversation_repo
            .set_last_message(conversation, &message.id, now)
            .await?;

        let sender = self.user_repo.find_by_id(sender_id).await?;
        let detail = MessageDetail {
            message,
            sender,
            read_by: vec![],
        };

        if let Err(e) = self
            .relay
            .publish_new_message(&[recipient_id], &detail)
            .await
        {
            tracing::warn!(message_id = %detail.message.id, error = %e, "Failed to relay message");
        }

        Ok(detail)
    }

    async fn details(&self, messages: Vec<message::Model>) -> AppResult<Vec<MessageDetail>> {
        if messages.is_empty() {
            return Ok(vec![]);
        }

        let ids: Vec<String> = messages.iter().map(|m| m.id.clone()).collect();
        let mut reads: HashMap<String, Vec<message_read::Model>> = HashMap::new();
        for read in self.message_repo.find_reads_for_messages(&ids).await? {
            reads.entry(read.message_id.clone()).or_default().push(read);
        }

        let mut sender_ids: Vec<String> = messages.iter().map(|m| m.sender_id.clone()).collect();
        sender_ids.sort();
        sender_ids.dedup();
        let senders = self.users_by_id(&sender_ids).await?;

        Ok(messages
            .into_iter()
            .map(|message| MessageDetail {
                sender: senders.get(&message.sender_id).cloned(),
                read_by: reads.remove(&message.id).unwrap_or_default(),
                message,
            })
            .collect())
    }

    async fn summarize(
        &self,
        viewer_id: &str,
        conversations: Vec<conversation::Model>,
    ) -> AppResult<Vec<ConversationSummary>> {
        if conversations.is_empty() {
            return Ok(vec![]);
        }

        let mut participant_ids: Vec<String> = conversations
            .iter()
            .flat_map(|c| c.participants().map(str::to_string))
            .collect();
        participant_ids.sort();
        participant_ids.dedup();
        let users = self.users_by_id(&participant_ids).await?;

        let last_ids: Vec<String> = conversations
            .iter()
            .filter_map(|c| c.last_message_id.clone())
            .collect();
        let mut last_messages: HashMap<String, message::Model> = self
            .message_repo
            .find_by_ids(&last_ids)
            .await?
            .into_iter()
            .map(|m| (m.id.clone(), m))
            .collect();

        let conversation_ids: Vec<String> = conversations.iter().map(|c| c.id.clone()).collect();
        let mut unread: HashMap<String, u64> = HashMap::new();
        for m in self.message_repo.find_unread(&conversation_ids, viewer_id).await? {
            *unread.entry(m.conversation_id).or_default() += 1;
        }

        Ok(conversations
            .into_iter()
            .map(|conversation| {
                let participants = conversation
                    .participants()
                    .iter()
                    .filter_map(|id| users.get(*id).cloned())
                    .collect();
                let last_message = conversation
                    .last_message_id
                    .as_ref()
                    .and_then(|id| last_messages.remove(id));
                let unread_count = unread.get(&conversation.id).copied().unwrap_or(0);
                ConversationSummary {
                    conversation,
                    participants,
                    last_message,
                    unread_count,
                }
            })
            .collect())
    }

    async fn users_by_id(&self, ids: &[String]) -> AppResult<HashMap<String, user::Model>> {
        Ok(self
            .user_repo
            .find_by_ids(ids)
            .await?
            .into_iter()
            .map(|u| (u.id.clone(), u))
            .collect())
    }
}
