//! The tag of the polymorphic like relation.
//!
//! A like row is `{target_kind, target_id, liked_by}`; `LikeTarget` is the
//! `target_kind` half of that tagged union.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LikeTarget {
    Video,
    Comment,
    Tweet,
}

impl LikeTarget {
    /// Value stored in `likes.target_kind`.
    pub fn as_str(self) -> &'static str {
        match self {
            LikeTarget::Video => "video",
            LikeTarget::Comment => "comment",
            LikeTarget::Tweet => "tweet",
        }
    }

    /// Table holding the liked rows.
    pub fn table(self) -> &'static str {
        match self {
            LikeTarget::Video => "videos",
            LikeTarget::Comment => "comments",
            LikeTarget::Tweet => "tweets",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            LikeTarget::Video => "Video",
            LikeTarget::Comment => "Comment",
            LikeTarget::Tweet => "Tweet",
        }
    }
}
