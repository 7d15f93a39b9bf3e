use crate::{
    errors::AppError,
    extractors::{Actor, ApiJson, ApiQuery, MaybeActor},
    handlers::{ContentBody, PageQuery},
    models::{comment::Comment, like::LikeTarget, video::Video},
    response::ApiResponse,
    services::{
        ServiceError, ServiceResult,
        aggregate::{Enriched, Enrichment, Filter, Pipeline},
        parse_id,
        repository::Patch,
        require_text,
        toggle::Relation,
    },
    state::AppState,
};
use axum::extract::{Path, State};
use uuid::Uuid;

/// Comments on a draft exist only for its owner.
async fn visible_video(state: &AppState, video_id: Uuid, viewer: Option<Uuid>) -> ServiceResult<Video> {
    let video = state.repo.get_by_id::<Video>(video_id).await?;
    if !video.visible_to(viewer) {
        return Err(ServiceError::not_found("Video not found"));
    }
    Ok(video)
}

/// `GET /comments/{videoId}`: newest first, with owner and like count.
pub async fn list_comments(
    State(state): State<AppState>,
    viewer: MaybeActor,
    Path(video_id): Path<String>,
    ApiQuery(page): ApiQuery<PageQuery>,
) -> Result<ApiResponse<Vec<Enriched<Comment>>>, AppError> {
    let video_id = parse_id(&video_id, "videoId")?;
    visible_video(&state, video_id, viewer.id()).await?;

    let likes = Relation::Like(LikeTarget::Comment).target_link();
    let comments = Pipeline::new()
        .filter(Filter::Eq("video_id", video_id.into()))
        .enrich(Enrichment::Owner { column: "owner_id" })
        .enrich(Enrichment::Count {
            field: "likesCount",
            link: likes,
        })
        .enrich(Enrichment::Flag {
            field: "isLiked",
            link: likes,
            key: viewer.id(),
        })
        .paginate(page.spec())
        .fetch::<Comment>(&state.db)
        .await?;

    Ok(ApiResponse::ok(comments, "Comments fetched successfully"))
}

/// `POST /comments/{videoId}`
pub async fn add_comment(
    State(state): State<AppState>,
    actor: Actor,
    Path(video_id): Path<String>,
    ApiJson(body): ApiJson<ContentBody>,
) -> Result<ApiResponse<Comment>, AppError> {
    let video_id = parse_id(&video_id, "videoId")?;
    let content = require_text(body.content.as_deref(), "content")?;
    visible_video(&state, video_id, Some(actor.id)).await?;

    let comment = state
        .repo
        .create::<Comment>(
            Patch::new()
                .set("content", content)
                .set("video_id", video_id)
                .set("owner_id", actor.id),
        )
        .await?;
    Ok(ApiResponse::created(comment, "Comment added successfully"))
}

/// `PATCH /comments/c/{commentId}`
pub async fn update_comment(
    State(state): State<AppState>,
    actor: Actor,
    Path(comment_id): Path<String>,
    ApiJson(body): ApiJson<ContentBody>,
) -> Result<ApiResponse<Comment>, AppError> {
    let comment_id = parse_id(&comment_id, "commentId")?;
    state.repo.get_owned::<Comment>(comment_id, actor.id).await?;
    let comment = state
        .repo
        .update_fields::<Comment>(comment_id, Patch::new().text("content", body.content))
        .await?;
    Ok(ApiResponse::ok(comment, "Comment updated successfully"))
}

/// `DELETE /comments/c/{commentId}`
pub async fn delete_comment(
    State(state): State<AppState>,
    actor: Actor,
    Path(comment_id): Path<String>,
) -> Result<ApiResponse<Comment>, AppError> {
    let comment_id = parse_id(&comment_id, "commentId")?;
    state.repo.get_owned::<Comment>(comment_id, actor.id).await?;
    let comment = state.repo.delete_by_id::<Comment>(comment_id).await?;
    Ok(ApiResponse::ok(comment, "Comment deleted successfully"))
}
