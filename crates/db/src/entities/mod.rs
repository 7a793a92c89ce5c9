//! Database entities.

#![allow(missing_docs)]

pub mod comment;
pub mod conversation;
pub mod following;
pub mod message;
pub mod message_read;
pub mod notification;
pub mod post;
pub mod post_like;
pub mod saved_post;
pub mod story;
pub mod story_reaction;
pub mod story_view;
pub mod user;
pub mod user_privacy;

pub use comment::Entity as Comment;
pub use conversation::Entity as Conversation;
pub use following::Entity as Following;
pub use message::Entity as Message;
pub use message_read::Entity as MessageRead;
pub use notification::Entity as Notification;
pub use post::Entity as Post;
pub use post_like::Entity as PostLike;
pub use saved_post::Entity as SavedPost;
pub use story::Entity as Story;
pub use story_reaction::Entity as StoryReaction;
pub use story_view::Entity as StoryView;
pub use user::Entity as User;
pub use user_privacy::Entity as UserPrivacy;
