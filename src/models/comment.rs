use crate::services::repository::{Owned, Resource};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Serialize, Clone, FromRow, Debug)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: Uuid,
    pub content: String,
    pub video_id: Uuid,
    pub owner_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Resource for Comment {
    const TABLE: &'static str = "comments";
    const LABEL: &'static str = "Comment";
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "content",
        "video_id",
        "owner_id",
        "created_at",
        "updated_at",
    ];
}

impl Owned for Comment {
    fn owner_id(&self) -> Uuid {
        self.owner_id
    }
}
