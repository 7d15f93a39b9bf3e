//! Playlists: named, owner-scoped, ordered sets of videos.

use crate::{
    models::video::Video,
    services::{
        aggregate::Enriched,
        repository::{Owned, Resource},
    },
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

/// Playlist header row. Membership lives in `playlist_videos`.
#[derive(Serialize, Clone, FromRow, Debug)]
#[serde(rename_all = "camelCase")]
pub struct Playlist {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub owner_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Resource for Playlist {
    const TABLE: &'static str = "playlists";
    const LABEL: &'static str = "Playlist";
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "name",
        "description",
        "owner_id",
        "created_at",
        "updated_at",
    ];
}

impl Owned for Playlist {
    fn owner_id(&self) -> Uuid {
        self.owner_id
    }
}

/// A playlist together with its videos in insertion order.
#[derive(Serialize, Debug)]
pub struct PlaylistDetail {
    #[serde(flatten)]
    pub playlist: Enriched<Playlist>,
    pub videos: Vec<Enriched<Video>>,
}
