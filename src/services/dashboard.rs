use crate::{
    models::{dashboard::ChannelStats, like::LikeTarget, video::Video},
    services::{
        ServiceResult,
        aggregate::{Enriched, Enrichment, Filter, Order, PageSpec, Pipeline},
        toggle::Relation,
    },
};
use sqlx::SqlitePool;
use uuid::Uuid;

/// Totals for the channel owned by `channel`. A channel with no content
/// reports zeros.
pub async fn channel_stats(db: &SqlitePool, channel: Uuid) -> ServiceResult<ChannelStats> {
    let (total_videos, total_views): (i64, i64) =
        sqlx::query_as("SELECT COUNT(*), COALESCE(SUM(views), 0) FROM videos WHERE owner_id = ?")
            .bind(channel)
            .fetch_one(db)
            .await?;

    let total_subscribers: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM subscriptions WHERE channel_id = ?")
            .bind(channel)
            .fetch_one(db)
            .await?;

    // likes on anything the channel owns
    let total_likes: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM likes l WHERE \
         (l.target_kind = ? AND l.target_id IN (SELECT id FROM videos WHERE owner_id = ?)) \
         OR (l.target_kind = ? AND l.target_id IN (SELECT id FROM comments WHERE owner_id = ?)) \
         OR (l.target_kind = ? AND l.target_id IN (SELECT id FROM tweets WHERE owner_id = ?))",
    )
    .bind(LikeTarget::Video.as_str())
    .bind(channel)
    .bind(LikeTarget::Comment.as_str())
    .bind(channel)
    .bind(LikeTarget::Tweet.as_str())
    .bind(channel)
    .fetch_one(db)
    .await?;

    Ok(ChannelStats {
        total_videos,
        total_views,
        total_subscribers,
        total_likes,
    })
}

/// Every video of the channel, drafts included, newest first.
pub async fn channel_videos(
    db: &SqlitePool,
    channel: Uuid,
    page: PageSpec,
) -> ServiceResult<Vec<Enriched<Video>>> {
    Pipeline::new()
        .filter(Filter::Eq("owner_id", channel.into()))
        .enrich(Enrichment::Count {
            field: "likesCount",
            link: Relation::Like(LikeTarget::Video).target_link(),
        })
        .order(Order::Newest)
        .paginate(page)
        .fetch(db)
        .await
}
