//! Like toggles for videos, comments and tweets, and the liked-videos list.

use crate::{
    errors::AppError,
    extractors::{Actor, ApiQuery},
    handlers::PageQuery,
    models::{like::LikeTarget, video::Video},
    response::ApiResponse,
    services::{
        aggregate::{Enriched, Enrichment, Filter, Pipeline},
        parse_id,
        toggle::Relation,
    },
    state::AppState,
};
use axum::extract::{Path, State};
use serde::Serialize;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LikeState {
    pub is_liked: bool,
    pub likes_count: i64,
}

async fn toggle(
    state: &AppState,
    target: LikeTarget,
    actor: &Actor,
    raw_id: &str,
    what: &str,
) -> Result<ApiResponse<LikeState>, AppError> {
    let target_id = parse_id(raw_id, what)?;
    let outcome = state
        .toggles
        .toggle(Relation::Like(target), target_id, actor.id)
        .await?;

    let message = format!(
        "{} {} successfully",
        target.label(),
        if outcome.created { "liked" } else { "unliked" }
    );
    Ok(ApiResponse::ok(
        LikeState {
            is_liked: outcome.created,
            likes_count: outcome.total,
        },
        message,
    ))
}

/// `POST /likes/toggle/v/{videoId}`
pub async fn toggle_video_like(
    State(state): State<AppState>,
    actor: Actor,
    Path(video_id): Path<String>,
) -> Result<ApiResponse<LikeState>, AppError> {
    toggle(&state, LikeTarget::Video, &actor, &video_id, "videoId").await
}

/// `POST /likes/toggle/c/{commentId}`
pub async fn toggle_comment_like(
    State(state): State<AppState>,
    actor: Actor,
    Path(comment_id): Path<String>,
) -> Result<ApiResponse<LikeState>, AppError> {
    toggle(&state, LikeTarget::Comment, &actor, &comment_id, "commentId").await
}

/// `POST /likes/toggle/t/{tweetId}`
pub async fn toggle_tweet_like(
    State(state): State<AppState>,
    actor: Actor,
    Path(tweet_id): Path<String>,
) -> Result<ApiResponse<LikeState>, AppError> {
    toggle(&state, LikeTarget::Tweet, &actor, &tweet_id, "tweetId").await
}

/// `GET /likes/videos`: published videos the actor has liked.
pub async fn liked_videos(
    State(state): State<AppState>,
    actor: Actor,
    ApiQuery(page): ApiQuery<PageQuery>,
) -> Result<ApiResponse<Vec<Enriched<Video>>>, AppError> {
    let likes = Relation::Like(LikeTarget::Video).target_link();
    let videos = Pipeline::new()
        .filter(Filter::Linked {
            link: likes,
            key: actor.id,
        })
        .filter(Filter::Eq("is_published", true.into()))
        .enrich(Enrichment::Owner { column: "owner_id" })
        .enrich(Enrichment::Count {
            field: "likesCount",
            link: likes,
        })
        .paginate(page.spec())
        .fetch::<Video>(&state.db)
        .await?;

    Ok(ApiResponse::ok(videos, "Liked videos fetched successfully"))
}
