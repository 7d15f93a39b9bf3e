use crate::{
    errors::AppError,
    extractors::{Actor, ApiQuery},
    handlers::PageQuery,
    models::{dashboard::ChannelStats, video::Video},
    response::ApiResponse,
    services::{aggregate::Enriched, dashboard},
    state::AppState,
};
use axum::extract::State;

/// `GET /dashboard/stats`
pub async fn channel_stats(
    State(state): State<AppState>,
    actor: Actor,
) -> Result<ApiResponse<ChannelStats>, AppError> {
    let stats = dashboard::channel_stats(&state.db, actor.id).await?;
    Ok(ApiResponse::ok(stats, "Channel stats fetched successfully"))
}

/// `GET /dashboard/videos`: drafts included.
pub async fn channel_videos(
    State(state): State<AppState>,
    actor: Actor,
    ApiQuery(page): ApiQuery<PageQuery>,
) -> Result<ApiResponse<Vec<Enriched<Video>>>, AppError> {
    let videos = dashboard::channel_videos(&state.db, actor.id, page.spec()).await?;
    Ok(ApiResponse::ok(videos, "Channel videos fetched successfully"))
}
