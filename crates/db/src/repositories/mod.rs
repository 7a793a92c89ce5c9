//! Repositories wrapping `sea-orm` queries per aggregate.

mod comment;
mod conversation;
mod following;
mod message;
mod notification;
mod post;
mod saved_post;
mod story;
mod user;
mod user_privacy;

pub use comment::CommentRepository;
pub use conversation::ConversationRepository;
pub use following::FollowingRepository;
pub use message::MessageRepository;
pub use notification::NotificationRepository;
pub use post::PostRepository;
pub use saved_post::SavedPostRepository;
pub use story::StoryRepository;
pub use user::UserRepository;
pub use user_privacy::UserPrivacyRepository;
