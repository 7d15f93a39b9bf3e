//! Playlist membership.
//!
//! Members live in `playlist_videos`, ordered by `position` and
//! deduplicated by `UNIQUE(playlist_id, video_id)`. Header CRUD goes through
//! the generic repository.

use crate::{
    models::{
        playlist::{Playlist, PlaylistDetail},
        video::Video,
    },
    services::{
        ServiceResult,
        aggregate::{Enrichment, Filter, Link, Order, Pipeline},
        repository::{Patch, Repository},
        require_text,
    },
};
use chrono::Utc;
use sqlx::{QueryBuilder, Sqlite};
use uuid::Uuid;

/// Videos of a playlist: `playlist_videos.video_id` points at the video,
/// `playlist_id` is the key.
pub const PLAYLIST_VIDEOS: Link = Link {
    table: "playlist_videos",
    member_column: "video_id",
    key_column: "playlist_id",
    discriminator: None,
};

/// Members of a playlist counted from the playlist row.
pub const PLAYLIST_MEMBERS: Link = Link {
    table: "playlist_videos",
    member_column: "playlist_id",
    key_column: "video_id",
    discriminator: None,
};

#[derive(Clone)]
pub struct PlaylistService {
    repo: Repository,
}

impl PlaylistService {
    pub fn new(repo: Repository) -> Self {
        Self { repo }
    }

    pub async fn create(
        &self,
        owner: Uuid,
        name: Option<&str>,
        description: Option<&str>,
    ) -> ServiceResult<Playlist> {
        let name = require_text(name, "name")?;
        let description = description.map(str::trim).unwrap_or_default().to_string();
        self.repo
            .create(
                Patch::new()
                    .set("name", name)
                    .set("description", description)
                    .set("owner_id", owner),
            )
            .await
    }

    /// Append `video` to the playlist. Adding a member twice is a no-op.
    pub async fn add_video(
        &self,
        playlist_id: Uuid,
        video_id: Uuid,
        actor: Uuid,
    ) -> ServiceResult<Playlist> {
        self.repo.get_owned::<Playlist>(playlist_id, actor).await?;
        self.repo.get_by_id::<Video>(video_id).await?;

        let mut tx = self.repo.db.begin().await?;
        let mut insert = QueryBuilder::<Sqlite>::new(
            "INSERT INTO playlist_videos (playlist_id, video_id, position, added_at) SELECT ",
        );
        insert
            .push_bind(playlist_id)
            .push(", ")
            .push_bind(video_id)
            .push(", COALESCE(MAX(position) + 1, 0), ")
            .push_bind(Utc::now())
            .push(" FROM playlist_videos WHERE playlist_id = ")
            .push_bind(playlist_id)
            .push(" ON CONFLICT DO NOTHING");
        let added = insert.build().execute(&mut *tx).await?.rows_affected();
        touch(&mut tx, playlist_id).await?;
        tx.commit().await?;

        tracing::info!(%playlist_id, %video_id, added, "playlist member added");
        self.repo.get_by_id(playlist_id).await
    }

    /// Remove `video` from the playlist. Removing a non-member succeeds.
    pub async fn remove_video(
        &self,
        playlist_id: Uuid,
        video_id: Uuid,
        actor: Uuid,
    ) -> ServiceResult<Playlist> {
        self.repo.get_owned::<Playlist>(playlist_id, actor).await?;

        let mut tx = self.repo.db.begin().await?;
        let removed = sqlx::query("DELETE FROM playlist_videos WHERE playlist_id = ? AND video_id = ?")
            .bind(playlist_id)
            .bind(video_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        touch(&mut tx, playlist_id).await?;
        tx.commit().await?;

        tracing::info!(%playlist_id, %video_id, removed, "playlist member removed");
        self.repo.get_by_id(playlist_id).await
    }

    /// The playlist with its member videos in insertion order.
    pub async fn detail(&self, playlist_id: Uuid) -> ServiceResult<PlaylistDetail> {
        let playlist = Pipeline::new()
            .filter(Filter::Eq("id", playlist_id.into()))
            .enrich(Enrichment::Owner { column: "owner_id" })
            .enrich(Enrichment::Count {
                field: "totalVideos",
                link: PLAYLIST_MEMBERS,
            })
            .fetch_one::<Playlist>(&self.repo.db)
            .await?;

        let videos = Pipeline::new()
            .filter(Filter::Linked {
                link: PLAYLIST_VIDEOS,
                key: playlist_id,
            })
            .enrich(Enrichment::Owner { column: "owner_id" })
            .order(Order::LinkPosition {
                link: PLAYLIST_VIDEOS,
                key: playlist_id,
                column: "position",
            })
            .fetch::<Video>(&self.repo.db)
            .await?;

        Ok(PlaylistDetail { playlist, videos })
    }
}

async fn touch(tx: &mut sqlx::Transaction<'_, Sqlite>, playlist_id: Uuid) -> ServiceResult<()> {
    sqlx::query("UPDATE playlists SET updated_at = ? WHERE id = ?")
        .bind(Utc::now())
        .bind(playlist_id)
        .execute(&mut **tx)
        .await?;
    Ok(())
}
