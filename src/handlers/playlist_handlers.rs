use crate::{
    errors::AppError,
    extractors::{Actor, ApiJson, ApiQuery},
    handlers::PageQuery,
    models::{
        playlist::{Playlist, PlaylistDetail},
        user::User,
    },
    response::ApiResponse,
    services::{
        aggregate::{Enriched, Enrichment, Filter, Pipeline},
        parse_id,
        playlists::PLAYLIST_MEMBERS,
        repository::Patch,
    },
    state::AppState,
};
use axum::extract::{Path, State};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct PlaylistBody {
    pub name: Option<String>,
    pub description: Option<String>,
}

/// `POST /playlists`
pub async fn create_playlist(
    State(state): State<AppState>,
    actor: Actor,
    ApiJson(body): ApiJson<PlaylistBody>,
) -> Result<ApiResponse<Playlist>, AppError> {
    let playlist = state
        .playlists
        .create(actor.id, body.name.as_deref(), body.description.as_deref())
        .await?;
    Ok(ApiResponse::created(playlist, "Playlist created successfully"))
}

/// `GET /playlists/user/{userId}`
pub async fn user_playlists(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    ApiQuery(page): ApiQuery<PageQuery>,
) -> Result<ApiResponse<Vec<Enriched<Playlist>>>, AppError> {
    let user_id = parse_id(&user_id, "userId")?;
    state.repo.get_by_id::<User>(user_id).await?;

    let playlists = Pipeline::new()
        .filter(Filter::Eq("owner_id", user_id.into()))
        .enrich(Enrichment::Count {
            field: "totalVideos",
            link: PLAYLIST_MEMBERS,
        })
        .paginate(page.spec())
        .fetch::<Playlist>(&state.db)
        .await?;

    Ok(ApiResponse::ok(playlists, "User playlists fetched successfully"))
}

/// `GET /playlists/{playlistId}`
pub async fn get_playlist(
    State(state): State<AppState>,
    Path(playlist_id): Path<String>,
) -> Result<ApiResponse<PlaylistDetail>, AppError> {
    let playlist_id = parse_id(&playlist_id, "playlistId")?;
    let detail = state.playlists.detail(playlist_id).await?;
    Ok(ApiResponse::ok(detail, "Playlist fetched successfully"))
}

/// `PATCH /playlists/{playlistId}`
pub async fn update_playlist(
    State(state): State<AppState>,
    actor: Actor,
    Path(playlist_id): Path<String>,
    ApiJson(body): ApiJson<PlaylistBody>,
) -> Result<ApiResponse<Playlist>, AppError> {
    let playlist_id = parse_id(&playlist_id, "playlistId")?;
    state.repo.get_owned::<Playlist>(playlist_id, actor.id).await?;
    let playlist = state
        .repo
        .update_fields::<Playlist>(
            playlist_id,
            Patch::new()
                .text("name", body.name)
                .text("description", body.description),
        )
        .await?;
    Ok(ApiResponse::ok(playlist, "Playlist updated successfully"))
}

/// `DELETE /playlists/{playlistId}`: members go with it, videos stay.
pub async fn delete_playlist(
    State(state): State<AppState>,
    actor: Actor,
    Path(playlist_id): Path<String>,
) -> Result<ApiResponse<Playlist>, AppError> {
    let playlist_id = parse_id(&playlist_id, "playlistId")?;
    state.repo.get_owned::<Playlist>(playlist_id, actor.id).await?;
    let playlist = state.repo.delete_by_id::<Playlist>(playlist_id).await?;
    Ok(ApiResponse::ok(playlist, "Playlist deleted successfully"))
}

/// `PATCH /playlists/add/{videoId}/{playlistId}`
pub async fn add_video(
    State(state): State<AppState>,
    actor: Actor,
    Path((video_id, playlist_id)): Path<(String, String)>,
) -> Result<ApiResponse<Playlist>, AppError> {
    let video_id = parse_id(&video_id, "videoId")?;
    let playlist_id = parse_id(&playlist_id, "playlistId")?;
    let playlist = state
        .playlists
        .add_video(playlist_id, video_id, actor.id)
        .await?;
    Ok(ApiResponse::ok(playlist, "Video added to playlist"))
}

/// `PATCH /playlists/remove/{videoId}/{playlistId}`
pub async fn remove_video(
    State(state): State<AppState>,
    actor: Actor,
    Path((video_id, playlist_id)): Path<(String, String)>,
) -> Result<ApiResponse<Playlist>, AppError> {
    let video_id = parse_id(&video_id, "videoId")?;
    let playlist_id = parse_id(&playlist_id, "playlistId")?;
    let playlist = state
        .playlists
        .remove_video(playlist_id, video_id, actor.id)
        .await?;
    Ok(ApiResponse::ok(playlist, "Video removed from playlist"))
}
