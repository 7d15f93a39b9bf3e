use crate::services::repository::{Owned, Resource};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Serialize, Clone, FromRow, Debug)]
#[serde(rename_all = "camelCase")]
pub struct Tweet {
    pub id: Uuid,
    pub content: String,
    pub owner_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Resource for Tweet {
    const TABLE: &'static str = "tweets";
    const LABEL: &'static str = "Tweet";
    const COLUMNS: &'static [&'static str] =
        &["id", "content", "owner_id", "created_at", "updated_at"];
}

impl Owned for Tweet {
    fn owner_id(&self) -> Uuid {
        self.owner_id
    }
}
