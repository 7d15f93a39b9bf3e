use crate::{
    errors::AppError,
    extractors::{Actor, ApiJson, ApiQuery, MaybeActor},
    handlers::{ContentBody, PageQuery},
    models::{like::LikeTarget, tweet::Tweet, user::User},
    response::ApiResponse,
    services::{
        aggregate::{Enriched, Enrichment, Filter, Pipeline},
        parse_id,
        repository::Patch,
        require_text,
        toggle::Relation,
    },
    state::AppState,
};
use axum::extract::{Path, State};

/// `POST /tweets`
pub async fn create_tweet(
    State(state): State<AppState>,
    actor: Actor,
    ApiJson(body): ApiJson<ContentBody>,
) -> Result<ApiResponse<Tweet>, AppError> {
    let content = require_text(body.content.as_deref(), "content")?;
    let tweet = state
        .repo
        .create::<Tweet>(Patch::new().set("content", content).set("owner_id", actor.id))
        .await?;
    Ok(ApiResponse::created(tweet, "Tweet created successfully"))
}

/// `GET /tweets/user/{userId}`
pub async fn user_tweets(
    State(state): State<AppState>,
    viewer: MaybeActor,
    Path(user_id): Path<String>,
    ApiQuery(page): ApiQuery<PageQuery>,
) -> Result<ApiResponse<Vec<Enriched<Tweet>>>, AppError> {
    let user_id = parse_id(&user_id, "userId")?;
    state.repo.get_by_id::<User>(user_id).await?;

    let likes = Relation::Like(LikeTarget::Tweet).target_link();
    let tweets = Pipeline::new()
        .filter(Filter::Eq("owner_id", user_id.into()))
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
        .fetch::<Tweet>(&state.db)
        .await?;

    Ok(ApiResponse::ok(tweets, "Tweets fetched successfully"))
}

/// `PATCH /tweets/{tweetId}`
pub async fn update_tweet(
    State(state): State<AppState>,
    actor: Actor,
    Path(tweet_id): Path<String>,
    ApiJson(body): ApiJson<ContentBody>,
) -> Result<ApiResponse<Tweet>, AppError> {
    let tweet_id = parse_id(&tweet_id, "tweetId")?;
    state.repo.get_owned::<Tweet>(tweet_id, actor.id).await?;
    let tweet = state
        .repo
        .update_fields::<Tweet>(tweet_id, Patch::new().text("content", body.content))
        .await?;
    Ok(ApiResponse::ok(tweet, "Tweet updated successfully"))
}

/// `DELETE /tweets/{tweetId}`
pub async fn delete_tweet(
    State(state): State<AppState>,
    actor: Actor,
    Path(tweet_id): Path<String>,
) -> Result<ApiResponse<Tweet>, AppError> {
    let tweet_id = parse_id(&tweet_id, "tweetId")?;
    state.repo.get_owned::<Tweet>(tweet_id, actor.id).await?;
    let tweet = state.repo.delete_by_id::<Tweet>(tweet_id).await?;
    Ok(ApiResponse::ok(tweet, "Tweet deleted successfully"))
}
