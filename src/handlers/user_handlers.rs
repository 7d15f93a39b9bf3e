//! Account endpoints under `/users`.
//!
//! Login and refresh set `accessToken` / `refreshToken` cookies (HttpOnly,
//! Secure) and also return both tokens in the body for non-browser clients.

use crate::{
    errors::AppError,
    extractors::{ACCESS_COOKIE, Actor, ApiJson, ApiMultipart, MaybeActor, REFRESH_COOKIE, UploadForm},
    models::user::{Channel, User},
    response::ApiResponse,
    services::{
        ServiceError,
        aggregate::Enriched,
        auth::TokenPair,
        media::MediaKind,
        users::{ProfileImage, Registration},
    },
    state::AppState,
};
use axum::{
    body::Bytes,
    extract::{Path, State},
};
use axum_extra::extract::{CookieJar, cookie::Cookie};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct LoginBody {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshBody {
    pub refresh_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordBody {
    pub old_password: Option<String>,
    pub new_password: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountBody {
    pub full_name: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub user: User,
    #[serde(flatten)]
    pub tokens: TokenPair,
}

fn session_cookies(jar: CookieJar, tokens: &TokenPair) -> CookieJar {
    jar.add(
        Cookie::build((ACCESS_COOKIE, tokens.access_token.clone()))
            .http_only(true)
            .secure(true)
            .path("/"),
    )
    .add(
        Cookie::build((REFRESH_COOKIE, tokens.refresh_token.clone()))
            .http_only(true)
            .secure(true)
            .path("/"),
    )
}

/// `POST /users/register`: multipart with `avatar` (required) and
/// `coverImage` (optional) files.
pub async fn register(
    State(state): State<AppState>,
    ApiMultipart(multipart): ApiMultipart,
) -> Result<ApiResponse<User>, AppError> {
    let form = UploadForm::read(
        multipart,
        &state.media,
        &[("avatar", MediaKind::Avatar), ("coverImage", MediaKind::CoverImage)],
    )
    .await?;

    let registration = Registration {
        full_name: form.text("fullName").map(str::to_string),
        email: form.text("email").map(str::to_string),
        username: form.text("username").map(str::to_string),
        password: form.text("password").map(str::to_string),
        avatar_url: form.file_url("avatar"),
        cover_image_url: form.file_url("coverImage"),
    };
    let registered = state.users.register(registration).await;
    let user = form.settle(&state.media, registered).await?;

    Ok(ApiResponse::created(user, "User registered successfully"))
}

/// `POST /users/login`
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    ApiJson(body): ApiJson<LoginBody>,
) -> Result<(CookieJar, ApiResponse<Session>), AppError> {
    let password = body
        .password
        .filter(|p| !p.is_empty())
        .ok_or_else(|| ServiceError::invalid("password is required"))?;
    let (user, tokens) = state
        .users
        .login(body.username.as_deref(), body.email.as_deref(), &password)
        .await?;

    tracing::info!(user_id = %user.id, "user logged in");
    let jar = session_cookies(jar, &tokens);
    Ok((
        jar,
        ApiResponse::ok(Session { user, tokens }, "User logged in successfully"),
    ))
}

/// `POST /users/logout`
pub async fn logout(
    State(state): State<AppState>,
    actor: Actor,
    jar: CookieJar,
) -> Result<(CookieJar, ApiResponse<serde_json::Value>), AppError> {
    state.users.logout(actor.id).await?;

    let jar = jar
        .remove(Cookie::build(ACCESS_COOKIE).path("/"))
        .remove(Cookie::build(REFRESH_COOKIE).path("/"));
    Ok((
        jar,
        ApiResponse::ok(serde_json::json!({}), "User logged out successfully"),
    ))
}

/// `POST /users/refresh-token`: the token comes from the cookie or from a
/// JSON body `{ "refreshToken": ... }`.
pub async fn refresh_token(
    State(state): State<AppState>,
    jar: CookieJar,
    body: Bytes,
) -> Result<(CookieJar, ApiResponse<TokenPair>), AppError> {
    let from_body = if body.iter().all(u8::is_ascii_whitespace) {
        RefreshBody::default()
    } else {
        serde_json::from_slice::<RefreshBody>(&body)
            .map_err(|err| AppError::bad_request(format!("Invalid JSON body: {}", err)))?
    };

    let token = jar
        .get(REFRESH_COOKIE)
        .map(|cookie| cookie.value().to_string())
        .filter(|v| !v.is_empty())
        .or(from_body.refresh_token)
        .ok_or_else(|| ServiceError::unauthorized("Unauthorized request"))?;

    let (_, tokens) = state.users.refresh(&token).await?;
    let jar = session_cookies(jar, &tokens);
    Ok((jar, ApiResponse::ok(tokens, "Access token refreshed")))
}

/// `POST /users/change-password`
pub async fn change_password(
    State(state): State<AppState>,
    actor: Actor,
    ApiJson(body): ApiJson<ChangePasswordBody>,
) -> Result<ApiResponse<serde_json::Value>, AppError> {
    let (Some(old_password), Some(new_password)) = (body.old_password, body.new_password) else {
        return Err(ServiceError::invalid("oldPassword and newPassword are required").into());
    };
    state
        .users
        .change_password(actor.id, &old_password, &new_password)
        .await?;
    Ok(ApiResponse::ok(
        serde_json::json!({}),
        "Password changed successfully",
    ))
}

/// `GET /users/current-user`
pub async fn current_user(
    State(state): State<AppState>,
    actor: Actor,
) -> Result<ApiResponse<User>, AppError> {
    let user = state.users.current(actor.id).await?;
    Ok(ApiResponse::ok(user, "Current user fetched successfully"))
}

/// `PATCH /users/update-account`
pub async fn update_account(
    State(state): State<AppState>,
    actor: Actor,
    ApiJson(body): ApiJson<AccountBody>,
) -> Result<ApiResponse<User>, AppError> {
    let user = state
        .users
        .update_account(actor.id, body.full_name, body.email)
        .await?;
    Ok(ApiResponse::ok(user, "Account details updated successfully"))
}

async fn replace_image(
    state: &AppState,
    actor: &Actor,
    multipart: axum::extract::Multipart,
    image: ProfileImage,
) -> Result<User, AppError> {
    let (field, kind, what) = match image {
        ProfileImage::Avatar => ("avatar", MediaKind::Avatar, "Avatar file"),
        ProfileImage::CoverImage => ("coverImage", MediaKind::CoverImage, "Cover image file"),
    };
    let form = UploadForm::read(multipart, &state.media, &[(field, kind)]).await?;
    let url = form
        .file_url(field)
        .ok_or_else(|| ServiceError::invalid(format!("{} is required", what)))?;

    let replaced = state.users.set_image(actor.id, image, url).await;
    let (user, previous) = form.settle(&state.media, replaced).await?;
    state.media.remove_url(&previous).await;
    Ok(user)
}

/// `PATCH /users/avatar`
pub async fn update_avatar(
    State(state): State<AppState>,
    actor: Actor,
    ApiMultipart(multipart): ApiMultipart,
) -> Result<ApiResponse<User>, AppError> {
    let user = replace_image(&state, &actor, multipart, ProfileImage::Avatar).await?;
    Ok(ApiResponse::ok(user, "Avatar updated successfully"))
}

/// `PATCH /users/cover-image`
pub async fn update_cover_image(
    State(state): State<AppState>,
    actor: Actor,
    ApiMultipart(multipart): ApiMultipart,
) -> Result<ApiResponse<User>, AppError> {
    let user = replace_image(&state, &actor, multipart, ProfileImage::CoverImage).await?;
    Ok(ApiResponse::ok(user, "Cover image updated successfully"))
}

/// `GET /users/c/{username}`
pub async fn channel_profile(
    State(state): State<AppState>,
    viewer: MaybeActor,
    Path(username): Path<String>,
) -> Result<ApiResponse<Enriched<Channel>>, AppError> {
    let channel = state.users.channel_profile(&username, viewer.id()).await?;
    Ok(ApiResponse::ok(channel, "User channel fetched successfully"))
}
