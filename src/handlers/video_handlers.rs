//! Video upload, listing, detail and owner edits.

use crate::{
    errors::AppError,
    extractors::{Actor, ApiMultipart, ApiQuery, MaybeActor, UploadForm},
    models::{like::LikeTarget, video::Video},
    response::ApiResponse,
    services::{
        ServiceError, ServiceResult,
        aggregate::{Enriched, Enrichment, Filter, Order, PageSpec, Pipeline, SortDirection},
        media::MediaKind,
        parse_id,
        repository::Patch,
        require_text,
        toggle::Relation,
    },
    state::AppState,
};
use axum::extract::{Path, State};
use serde::Deserialize;
use uuid::Uuid;

const LIKES_COUNT: &str = "likesCount";
const IS_LIKED: &str = "isLiked";

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoListQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub query: Option<String>,
    pub sort_by: Option<String>,
    pub sort_type: Option<String>,
    pub user_id: Option<String>,
}

/// Map a client sort key to a column. Unknown keys are rejected.
fn sort_column(sort_by: &str) -> ServiceResult<&'static str> {
    match sort_by {
        "createdAt" => Ok("created_at"),
        "updatedAt" => Ok("updated_at"),
        "views" => Ok("views"),
        "duration" => Ok("duration"),
        "title" => Ok("title"),
        other => Err(ServiceError::invalid(format!("Cannot sort by {}", other))),
    }
}

fn sort_direction(sort_type: Option<&str>) -> SortDirection {
    match sort_type.map(str::to_ascii_lowercase).as_deref() {
        Some("asc") => SortDirection::Asc,
        _ => SortDirection::Desc,
    }
}

fn parse_duration(raw: Option<&str>) -> ServiceResult<f64> {
    match raw.map(str::trim).filter(|v| !v.is_empty()) {
        None => Ok(0.0),
        Some(v) => match v.parse::<f64>() {
            Ok(d) if d.is_finite() && d >= 0.0 => Ok(d),
            _ => Err(ServiceError::invalid("Invalid duration")),
        },
    }
}

fn with_likes(pipeline: Pipeline, viewer: Option<Uuid>) -> Pipeline {
    let likes = Relation::Like(LikeTarget::Video).target_link();
    pipeline
        .enrich(Enrichment::Owner { column: "owner_id" })
        .enrich(Enrichment::Count {
            field: LIKES_COUNT,
            link: likes,
        })
        .enrich(Enrichment::Flag {
            field: IS_LIKED,
            link: likes,
            key: viewer,
        })
}

/// `GET /videos`: published videos, random order unless `sortBy` is given.
pub async fn list_videos(
    State(state): State<AppState>,
    viewer: MaybeActor,
    ApiQuery(q): ApiQuery<VideoListQuery>,
) -> Result<ApiResponse<Vec<Enriched<Video>>>, AppError> {
    let mut pipeline = Pipeline::new().filter(Filter::Eq("is_published", true.into()));

    if let Some(user_id) = q.user_id.as_deref().filter(|v| !v.trim().is_empty()) {
        pipeline = pipeline.filter(Filter::Eq("owner_id", parse_id(user_id, "userId")?.into()));
    }
    if let Some(term) = q.query.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
        pipeline = pipeline.filter(Filter::Search(&["title", "description"], term.to_string()));
    }

    let order = match q.sort_by.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
        Some(sort_by) => Order::Column(sort_column(sort_by)?, sort_direction(q.sort_type.as_deref())),
        None => Order::Random,
    };

    let videos = with_likes(pipeline, viewer.id())
        .order(order)
        .paginate(PageSpec::new(q.page, q.limit))
        .fetch::<Video>(&state.db)
        .await?;

    let message = if videos.is_empty() {
        "No videos found"
    } else {
        "Videos fetched successfully"
    };
    Ok(ApiResponse::ok(videos, message))
}

/// `POST /videos`: multipart upload of `videoFile` and `thumbnail`.
pub async fn publish_video(
    State(state): State<AppState>,
    actor: Actor,
    ApiMultipart(multipart): ApiMultipart,
) -> Result<ApiResponse<Video>, AppError> {
    let form = UploadForm::read(
        multipart,
        &state.media,
        &[("videoFile", MediaKind::Video), ("thumbnail", MediaKind::Thumbnail)],
    )
    .await?;

    let created: ServiceResult<Video> = async {
        let title = require_text(form.text("title"), "title")?;
        let description = require_text(form.text("description"), "description")?;
        let duration = parse_duration(form.text("duration"))?;
        let video_file = form
            .file_url("videoFile")
            .ok_or_else(|| ServiceError::invalid("Video file is required"))?;
        let thumbnail = form
            .file_url("thumbnail")
            .ok_or_else(|| ServiceError::invalid("Thumbnail is required"))?;

        state
            .repo
            .create::<Video>(
                Patch::new()
                    .set("video_file", video_file)
                    .set("thumbnail", thumbnail)
                    .set("title", title)
                    .set("description", description)
                    .set("duration", duration)
                    .set("owner_id", actor.id),
            )
            .await
    }
    .await;
    let video = form.settle(&state.media, created).await?;

    tracing::info!(video_id = %video.id, owner = %actor.username, "video published");
    Ok(ApiResponse::created(video, "Video uploaded successfully"))
}

/// `GET /videos/{id}`: drafts are visible to their owner only. Each read
/// counts as a view.
pub async fn get_video(
    State(state): State<AppState>,
    viewer: MaybeActor,
    Path(video_id): Path<String>,
) -> Result<ApiResponse<Enriched<Video>>, AppError> {
    let video_id = parse_id(&video_id, "videoId")?;
    let mut video = with_likes(
        Pipeline::new().filter(Filter::Eq("id", video_id.into())),
        viewer.id(),
    )
    .fetch_one::<Video>(&state.db)
    .await?;

    if !video.item.visible_to(viewer.id()) {
        return Err(ServiceError::not_found("Video not found").into());
    }

    state.repo.increment::<Video>(video_id, "views", 1).await?;
    video.item.views += 1;

    Ok(ApiResponse::ok(video, "Video fetched successfully"))
}

/// `PATCH /videos/{id}`: title, description and thumbnail, all optional.
pub async fn update_video(
    State(state): State<AppState>,
    actor: Actor,
    Path(video_id): Path<String>,
    ApiMultipart(multipart): ApiMultipart,
) -> Result<ApiResponse<Video>, AppError> {
    let video_id = parse_id(&video_id, "videoId")?;
    let form = UploadForm::read(multipart, &state.media, &[("thumbnail", MediaKind::Thumbnail)]).await?;

    let updated = async {
        let before = state.repo.get_owned::<Video>(video_id, actor.id).await?;
        let mut patch = Patch::new()
            .text("title", form.text("title").map(str::to_string))
            .text("description", form.text("description").map(str::to_string));
        if let Some(thumbnail) = form.file_url("thumbnail") {
            patch = patch.set("thumbnail", thumbnail);
        }
        let after = state.repo.update_fields::<Video>(video_id, patch).await?;
        Ok::<_, ServiceError>((before, after))
    }
    .await;
    let (before, after) = form.settle(&state.media, updated).await?;

    if before.thumbnail != after.thumbnail {
        state.media.remove_url(&before.thumbnail).await;
    }
    Ok(ApiResponse::ok(after, "Video updated successfully"))
}

/// `DELETE /videos/{id}`: removes the row and its media files. Likes and
/// comments on the video are left in place.
pub async fn delete_video(
    State(state): State<AppState>,
    actor: Actor,
    Path(video_id): Path<String>,
) -> Result<ApiResponse<Video>, AppError> {
    let video_id = parse_id(&video_id, "videoId")?;
    state.repo.get_owned::<Video>(video_id, actor.id).await?;
    let deleted = state.repo.delete_by_id::<Video>(video_id).await?;

    state.media.remove_url(&deleted.video_file).await;
    state.media.remove_url(&deleted.thumbnail).await;

    tracing::info!(%video_id, owner = %actor.username, "video deleted");
    Ok(ApiResponse::ok(deleted, "Video deleted successfully"))
}

/// `PATCH /videos/toggle/publish/{id}`
pub async fn toggle_publish(
    State(state): State<AppState>,
    actor: Actor,
    Path(video_id): Path<String>,
) -> Result<ApiResponse<Video>, AppError> {
    let video_id = parse_id(&video_id, "videoId")?;
    let video = state.repo.get_owned::<Video>(video_id, actor.id).await?;
    let video = state
        .repo
        .update_fields::<Video>(video_id, Patch::new().set("is_published", !video.is_published))
        .await?;

    let message = if video.is_published {
        "Video published"
    } else {
        "Video unpublished"
    };
    Ok(ApiResponse::ok(video, message))
}
