use crate::services::repository::{Owned, Resource};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

/// A published (or draft) video.
///
/// `video_file` and `thumbnail` are media URLs; the bytes live in the media
/// store.
#[derive(Serialize, Clone, FromRow, Debug)]
#[serde(rename_all = "camelCase")]
pub struct Video {
    pub id: Uuid,
    pub video_file: String,
    pub thumbnail: String,
    pub title: String,
    pub description: String,

    /// Length in seconds, as reported by the uploader.
    pub duration: f64,

    pub views: i64,
    pub is_published: bool,
    pub owner_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Video {
    /// Drafts are visible to their owner only.
    pub fn visible_to(&self, viewer: Option<Uuid>) -> bool {
        self.is_published || viewer == Some(self.owner_id)
    }
}

impl Resource for Video {
    const TABLE: &'static str = "videos";
    const LABEL: &'static str = "Video";
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "video_file",
        "thumbnail",
        "title",
        "description",
        "duration",
        "views",
        "is_published",
        "owner_id",
        "created_at",
        "updated_at",
    ];
}

impl Owned for Video {
    fn owner_id(&self) -> Uuid {
        self.owner_id
    }
}
