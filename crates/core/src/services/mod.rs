//! Business logic services.

pub mod comment;
pub mod following;
pub mod live_relay;
pub mod mailer;
pub mod messaging;
pub mod notification;
pub mod otp;
pub mod post;
pub mod story;
pub mod token;
pub mod user;
pub mod validation;
pub mod visibility;

pub use comment::{AddCommentInput, CommentNode, CommentService};
pub use following::FollowingService;
pub use live_relay::{LiveRelay, LiveRelayService, NoOpLiveRelay};
pub use mailer::{LogMailer, Mailer, MailerService, SmtpMailer, mailer_from_config};
pub use messaging::{
    ConversationSummary, DirectMessageInput, MessageDetail, MessagingService, SendMessageInput,
};
pub use notification::{
    CreateNotificationInput, NotificationDetail, NotificationDraft, NotificationOutbox,
    NotificationService, NotificationWorker,
};
pub use otp::{LoginWithOtpInput, OtpService, SendLoginOtpInput, VerifyEmailInput};
pub use post::{CreatePostInput, FeedQuery, LikeState, PostDetail, PostService};
pub use story::{CreateStoryInput, ReactInput, StoryDetail, StoryReplyInput, StoryService};
pub use token::{Claims, TokenService};
pub use user::{
    AuthSession, ChangePasswordInput, LoginInput, Profile, RegisterInput, UpdatePrivacyInput,
    UpdateProfileInput, UserService,
};
pub use visibility::{Audience, Page, PrivacySettings};
