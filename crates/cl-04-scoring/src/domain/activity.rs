//! Community activity point table.
//!
//! | Activity | Points | Credited to |
//! |----------|--------|-------------|
//! | post created | +10 | author |
//! | post liked | +2 | post author |
//! | comment added | +5 | commenter |
//! | reply added | +3 | replier |
//! | comment liked | +1 | comment author |

use serde::{Deserialize, Serialize};
use shared_types::{OperationKey, UserId};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    PostCreated,
    PostLiked,
    CommentAdded,
    ReplyAdded,
    CommentLiked,
}

impl ActivityKind {
    #[must_use]
    pub fn points(self) -> i64 {
        match self {
            Self::PostCreated => 10,
            Self::PostLiked => 2,
            Self::CommentAdded => 5,
            Self::ReplyAdded => 3,
            Self::CommentLiked => 1,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PostCreated => "post_created",
            Self::PostLiked => "post_liked",
            Self::CommentAdded => "comment_added",
            Self::ReplyAdded => "reply_added",
            Self::CommentLiked => "comment_liked",
        }
    }
}

impl fmt::Display for ActivityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One scoreable event from the posts service.
///
/// `activity_id` identifies the event itself (a post id, a comment id, or
/// `"{target}:{liker}"` for likes) and makes the award idempotent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Activity {
    pub kind: ActivityKind,
    pub activity_id: String,
    /// User whose `coding_score` is credited.
    pub beneficiary: UserId,
}

impl Activity {
    pub fn post_created(post_id: impl Into<String>, author: UserId) -> Self {
        Self {
            kind: ActivityKind::PostCreated,
            activity_id: post_id.into(),
            beneficiary: author,
        }
    }

    pub fn post_liked(post_id: &str, liker: &UserId, author: UserId) -> Self {
        Self {
            kind: ActivityKind::PostLiked,
            activity_id: format!("{post_id}:{liker}"),
            beneficiary: author,
        }
    }

    pub fn comment_added(comment_id: impl Into<String>, commenter: UserId) -> Self {
        Self {
            kind: ActivityKind::CommentAdded,
            activity_id: comment_id.into(),
            beneficiary: commenter,
        }
    }

    pub fn reply_added(reply_id: impl Into<String>, replier: UserId) -> Self {
        Self {
            kind: ActivityKind::ReplyAdded,
            activity_id: reply_id.into(),
            beneficiary: replier,
        }
    }

    pub fn comment_liked(comment_id: &str, liker: &UserId, author: UserId) -> Self {
        Self {
            kind: ActivityKind::CommentLiked,
            activity_id: format!("{comment_id}:{liker}"),
            beneficiary: author,
        }
    }

    #[must_use]
    pub fn points(&self) -> i64 {
        self.kind.points()
    }

    #[must_use]
    pub fn operation_key(&self) -> OperationKey {
        OperationKey::new(format!("activity:{}:{}", self.kind, self.activity_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point_table() {
        assert_eq!(ActivityKind::PostCreated.points(), 10);
        assert_eq!(ActivityKind::PostLiked.points(), 2);
        assert_eq!(ActivityKind::CommentAdded.points(), 5);
        assert_eq!(ActivityKind::ReplyAdded.points(), 3);
        assert_eq!(ActivityKind::CommentLiked.points(), 1);
    }

    #[test]
    fn test_like_key_depends_on_liker() {
        let author = UserId::new("author");
        let a = Activity::post_liked("p1", &UserId::new("x"), author.clone());
        let b = Activity::post_liked("p1", &UserId::new("y"), author);
        assert_ne!(a.operation_key(), b.operation_key());
    }

    #[test]
    fn test_same_activity_same_key() {
        let a = Activity::comment_added("c1", UserId::new("u1"));
        let b = Activity::comment_added("c1", UserId::new("u1"));
        assert_eq!(a.operation_key(), b.operation_key());
        assert_eq!(a.operation_key().as_str(), "activity:comment_added:c1");
    }
}
