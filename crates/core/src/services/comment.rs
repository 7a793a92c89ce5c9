//! Comment service with threaded replies.

use std::collections::HashMap;

use chrono::Utc;
use pulse_common::{AppError, AppResult, IdGenerator};
use pulse_db::{
    entities::{comment, user},
    repositories::{CommentRepository, UserRepository},
};
use sea_orm::Set;
use serde::Deserialize;
use validator::Validate;

use crate::services::{
    notification::{NotificationDraft, NotificationOutbox},
    post::PostService,
    validation::not_blank,
};

/// Input for adding a comment.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AddCommentInput {
    #[validate(length(max = 1000), custom(function = "not_blank"))]
    pub content: String,

    /// ID of the comment being replied to.
    pub parent_comment: Option<String>,
}

/// A comment with its author and nested replies.
#[derive(Debug, Clone)]
pub struct CommentNode {
    pub comment: comment::Model,
    pub author: user::Model,
    pub replies: Vec<CommentNode>,
}

/// Comment service.
#[derive(Clone)]
pub struct CommentService {
    comment_repo: CommentRepository,
    user_repo: UserRepository,
    posts: PostService,
    outbox: NotificationOutbox,
    id_gen: IdGenerator,
}

impl CommentService {
    /// Create a new comment service.
    #[must_use]
    pub const fn new(
        comment_repo: CommentRepository,
        user_repo: UserRepository,
        posts: PostService,
        outbox: NotificationOutbox,
    ) -> Self {
        Self {
            comment_repo,
            user_repo,
            posts,
            outbox,
            id_gen: IdGenerator::new(),
        }
    }

    /// Comment tree of a visible post, oldest first at every level.
    pub async fn list(&self, viewer_id: &str, post_id: &str) -> AppResult<Vec<CommentNode>> {
        self.posts.get_visible(viewer_id, post_id).await?;

        let comments = self.comment_repo.find_by_post(post_id).await?;

        let mut author_ids: Vec<String> = comments.iter().map(|c| c.author_id.clone()).collect();
        author_ids.sort();
        author_ids.dedup();
        let authors: HashMap<String, user::Model> = self
            .user_repo
            .find_by_ids(&author_ids)
            .await?
            .into_iter()
            .map(|u| (u.id.clone(), u))
            .collect();

        Ok(build_tree(comments, &authors))
    }

    /// Add a comment or reply to a visible post.
    pub async fn add(
        &self,
        viewer_id: &str,
        post_id: &str,
        input: AddCommentInput,
    ) -> AppResult<CommentNode> {
        input.validate()?;

        let (post, _) = self.posts.get_visible(viewer_id, post_id).await?;

        if let Some(parent_id) = &input.parent_comment {
            let on_post = self
                .comment_repo
                .find_by_id(parent_id)
                .await?
                .is_some_and(|parent| parent.post_id == post_id);
            if !on_post {
                return Err(AppError::BadRequest(
                    "Parent comment not found on this post".to_string(),
                ));
            }
        }

        let author = self.user_repo.get_by_id(viewer_id).await?;

        let model = comment::ActiveModel {
            id: Set(self.id_gen.generate()),
            post_id: Set(post_id.to_string()),
            author_id: Set(viewer_id.to_string()),
            parent_id: Set(input.parent_comment),
            content: Set(input.content.trim().to_string()),
            created_at: Set(Utc::now().into()),
        };
        let comment = self.comment_repo.create(model).await?;

        if post.author_id != viewer_id {
            self.outbox
                .enqueue(NotificationDraft::comment(&post.author_id, &author, post_id));
        }

        Ok(CommentNode {
            comment,
            author,
            replies: vec![],
        })
    }
}

/// Nest `comments` under their parents, keeping input order among siblings.
///
/// Comments whose author is missing are dropped together with their replies.
#[must_use]
pub fn build_tree(
    comments: Vec<comment::Model>,
    authors: &HashMap<String, user::Model>,
) -> Vec<CommentNode> {
    let known: std::collections::HashSet<String> = comments.iter().map(|c| c.id.clone()).collect();

    let mut children: HashMap<Option<String>, Vec<comment::Model>> = HashMap::new();
    for comment in comments {
        // a reply whose parent is gone is shown at the top level
        let parent = comment.parent_id.clone().filter(|id| known.contains(id));
        children.entry(parent).or_default().push(comment);
    }

    attach(None, &mut children, authors)
}

fn attach(
    parent: Option<String>,
    children: &mut HashMap<Option<String>, Vec<comment::Model>>,
    authors: &HashMap<String, user::Model>,
) -> Vec<CommentNode> {
    let Some(level) = children.remove(&parent) else {
        return vec![];
    };

    level
        .into_iter()
        .filter_map(|comment| {
            let author = authors.get(&comment.author_id)?.clone();
            let replies = attach(Some(comment.id.clone()), children, authors);
            Some(CommentNode {
                comment,
                author,
                replies,
            })
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pulse_db::{
        entities::{following, post, user_privacy},
        repositories::{
            FollowingRepository, PostRepository, SavedPostRepository, UserPrivacyRepository,
        },
    };
    use sea_orm::{DatabaseBackend, MockDatabase};
    use std::sync::Arc;

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

    fn create_test_comment(id: &str, author: &str, parent: Option<&str>) -> comment::Model {
        comment::Model {
            id: id.to_string(),
            post_id: "p".to_string(),
            author_id: author.to_string(),
            parent_id: parent.map(str::to_string),
            content: format!("comment {id}"),
            created_at: Utc::now().into(),
        }
    }

    fn authors(ids: &[&str]) -> HashMap<String, user::Model> {
        ids.iter()
            .map(|id| ((*id).to_string(), create_test_user(id)))
            .collect()
    }

    #[test]
    fn test_build_tree_nests_replies() {
        let comments = vec![
            create_test_comment("c1", "a", None),
            create_test_comment("c2", "b", Some("c1")),
            create_test_comment("c3", "a", None),
            create_test_comment("c4", "a", Some("c2")),
        ];

        let tree = build_tree(comments, &authors(&["a", "b"]));

        assert_eq!(tree.len(), 2);
        assert_eq!(tree[0].comment.id, "c1");
        assert_eq!(tree[0].replies[0].comment.id, "c2");
        assert_eq!(tree[0].replies[0].replies[0].comment.id, "c4");
        assert_eq!(tree[1].comment.id, "c3");
        assert!(tree[1].replies.is_empty());
    }

    #[test]
    fn test_build_tree_drops_orphaned_authors() {
        let comments = vec![
            create_test_comment("c1", "ghost", None),
            create_test_comment("c2", "a", Some("c1")),
            create_test_comment("c3", "a", None),
        ];

        let tree = build_tree(comments, &authors(&["a"]));

        assert_eq!(tree.len(), 1);
        assert_eq!(tree[0].comment.id, "c3");
    }

    #[test]
    fn test_build_tree_promotes_missing_parent() {
        let comments = vec![create_test_comment("c2", "a", Some("gone"))];

        let tree = build_tree(comments, &authors(&["a"]));

        assert_eq!(tree.len(), 1);
        assert_eq!(tree[0].comment.id, "c2");
    }

    #[tokio::test]
    async fn test_parent_from_other_post_rejected() {
        let mock = || MockDatabase::new(DatabaseBackend::Postgres);
        let conn = |db: MockDatabase| Arc::new(db.into_connection());
        let (outbox, _rx) = NotificationOutbox::channel();

        let post = post::Model {
            id: "p".to_string(),
            author_id: "a".to_string(),
            content: "hello".to_string(),
            media_url: None,
            kind: post::PostKind::Post,
            created_at: Utc::now().into(),
        };
        let posts = PostService::new(
            PostRepository::new(conn(mock().append_query_results([[post]]))),
            SavedPostRepository::new(conn(mock())),
            CommentRepository::new(conn(mock())),
            UserRepository::new(conn(mock().append_query_results([[create_test_user("a")]]))),
            UserPrivacyRepository::new(conn(
                mock().append_query_results([Vec::<user_privacy::Model>::new()]),
            )),
            FollowingRepository::new(conn(
                mock()
                    .append_query_results([Vec::<following::Model>::new()])
                    .append_query_results([Vec::<following::Model>::new()]),
            )),
            outbox.clone(),
        );

        let foreign_parent = comment::Model {
            post_id: "other".to_string(),
            ..create_test_comment("c1", "a", None)
        };
        let service = CommentService::new(
            CommentRepository::new(conn(mock().append_query_results([[foreign_parent]]))),
            UserRepository::new(conn(mock())),
            posts,
            outbox,
        );

        let result = service
            .add(
                "b",
                "p",
                AddCommentInput {
                    content: "reply".to_string(),
                    parent_comment: Some("c1".to_string()),
                },
            )
            .await;

        match result {
            Err(AppError::BadRequest(msg)) => assert_eq!(msg, "Parent comment not found on this post"),
            other => panic!("Expected BadRequest, got {other:?}"),
        }
    }
}
