use crate::{
    errors::AppError,
    extractors::{Actor, ApiQuery},
    handlers::PageQuery,
    models::user::Channel,
    response::ApiResponse,
    services::{
        ServiceError,
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
pub struct SubscriptionState {
    pub is_subscribed: bool,
    pub subscribers_count: i64,
}

/// `POST /subscriptions/c/{channelId}`: subscribe or unsubscribe.
pub async fn toggle_subscription(
    State(state): State<AppState>,
    actor: Actor,
    Path(channel_id): Path<String>,
) -> Result<ApiResponse<SubscriptionState>, AppError> {
    let channel_id = parse_id(&channel_id, "channelId")?;
    if channel_id == actor.id {
        return Err(ServiceError::invalid("You cannot subscribe to your own channel").into());
    }

    let outcome = state
        .toggles
        .toggle(Relation::Subscription, channel_id, actor.id)
        .await?;
    let message = if outcome.created {
        "Subscribed successfully"
    } else {
        "Unsubscribed successfully"
    };
    Ok(ApiResponse::ok(
        SubscriptionState {
            is_subscribed: outcome.created,
            subscribers_count: outcome.total,
        },
        message,
    ))
}

/// `GET /subscriptions/c/{channelId}`: channels `channelId` subscribes to.
pub async fn subscribed_channels(
    State(state): State<AppState>,
    Path(subscriber_id): Path<String>,
    ApiQuery(page): ApiQuery<PageQuery>,
) -> Result<ApiResponse<Vec<Enriched<Channel>>>, AppError> {
    let subscriber_id = parse_id(&subscriber_id, "channelId")?;
    let subscriptions = Relation::Subscription.target_link();

    let channels = Pipeline::new()
        .filter(Filter::Linked {
            link: subscriptions,
            key: subscriber_id,
        })
        .enrich(Enrichment::Count {
            field: "subscribersCount",
            link: subscriptions,
        })
        .paginate(page.spec())
        .fetch::<Channel>(&state.db)
        .await?;

    Ok(ApiResponse::ok(
        channels,
        "Successfully fetched list of subscribed channels",
    ))
}

/// `GET /subscriptions/u/{channelId}`: subscriber count of a channel.
pub async fn subscriber_count(
    State(state): State<AppState>,
    Path(channel_id): Path<String>,
) -> Result<ApiResponse<i64>, AppError> {
    let channel_id = parse_id(&channel_id, "channelId")?;
    let count = state
        .toggles
        .count(Relation::Subscription, channel_id)
        .await?;
    Ok(ApiResponse::ok(count, "Subscribers count fetched successfully"))
}
