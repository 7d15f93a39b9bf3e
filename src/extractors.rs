//! Request extractors: the authenticated actor, JSON and query bodies that
//! reject with the error envelope, and multipart upload forms.

use crate::{
    errors::AppError,
    services::{
        ServiceError,
        auth::TokenKind,
        media::{MediaKind, MediaStore, StoredMedia},
    },
    state::AppState,
};
use axum::{
    extract::{FromRequest, FromRequestParts, Multipart, Request},
    http::{header, request::Parts},
};
use axum_extra::extract::CookieJar;
use futures::TryStreamExt;
use std::{collections::HashMap, io};
use uuid::Uuid;

pub const ACCESS_COOKIE: &str = "accessToken";
pub const REFRESH_COOKIE: &str = "refreshToken";

/// The authenticated user making the request.
/// Rejects with 401 when no valid access token is presented.
#[derive(Debug, Clone)]
pub struct Actor {
    pub id: Uuid,
    pub username: String,
}

impl FromRequestParts<AppState> for Actor {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = access_token(parts).ok_or_else(|| {
            tracing::warn!(path = %parts.uri.path(), "request without access token");
            AppError::from(ServiceError::unauthorized("Unauthorized request"))
        })?;

        let claims = state.tokens().verify(&token, TokenKind::Access)?;
        Ok(Actor {
            id: claims.sub,
            username: claims.username,
        })
    }
}

/// Optional actor: `None` instead of 401 for anonymous requests.
#[derive(Debug, Clone)]
pub struct MaybeActor(pub Option<Actor>);

impl MaybeActor {
    pub fn id(&self) -> Option<Uuid> {
        self.0.as_ref().map(|actor| actor.id)
    }
}

impl FromRequestParts<AppState> for MaybeActor {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        match Actor::from_request_parts(parts, state).await {
            Ok(actor) => Ok(MaybeActor(Some(actor))),
            Err(_) => Ok(MaybeActor(None)),
        }
    }
}

/// `Authorization: Bearer <token>` wins over the `accessToken` cookie.
fn access_token(parts: &Parts) -> Option<String> {
    let bearer = parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string);

    bearer.or_else(|| {
        CookieJar::from_headers(&parts.headers)
            .get(ACCESS_COOKIE)
            .map(|cookie| cookie.value().to_string())
            .filter(|v| !v.is_empty())
    })
}

/// `axum::Json` whose rejection renders the error envelope.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct ApiJson<T>(pub T);

/// `axum::extract::Query` whose rejection renders the error envelope.
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(AppError))]
pub struct ApiQuery<T>(pub T);

/// `Multipart` whose rejection renders the error envelope.
pub struct ApiMultipart(pub Multipart);

impl<S> FromRequest<S> for ApiMultipart
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(Multipart::from_request(req, state).await?))
    }
}

/// Text fields and stored files of a multipart form.
#[derive(Debug, Default)]
pub struct UploadForm {
    pub fields: HashMap<String, String>,
    pub files: HashMap<String, StoredMedia>,
}

impl UploadForm {
    /// Drain the form. Fields named in `file_fields` are streamed to the
    /// media store under their kind; other file parts are ignored.
    pub async fn read(
        mut multipart: Multipart,
        media: &MediaStore,
        file_fields: &[(&str, MediaKind)],
    ) -> Result<Self, AppError> {
        let mut form = UploadForm::default();
        loop {
            let field = match multipart.next_field().await {
                Ok(Some(field)) => field,
                Ok(None) => break,
                Err(err) => {
                    form.discard(media).await;
                    return Err(AppError::new(err.status(), err.body_text()));
                }
            };
            let Some(name) = field.name().map(str::to_string) else {
                continue;
            };

            let kind = file_fields
                .iter()
                .find(|(field_name, _)| *field_name == name)
                .map(|(_, kind)| *kind);

            match kind {
                Some(kind) => {
                    let file_name = field.file_name().map(str::to_string);
                    let stream = field.map_err(io::Error::other);
                    match media.save_stream(kind, file_name.as_deref(), stream).await {
                        Ok(stored) => {
                            if let Some(replaced) = form.files.insert(name, stored) {
                                media.remove_url(&replaced.url).await;
                            }
                        }
                        Err(err) => {
                            form.discard(media).await;
                            return Err(err.into());
                        }
                    }
                }
                None if field.file_name().is_some() => {
                    tracing::debug!(field = %name, "ignoring unexpected file part");
                }
                None => match field.text().await {
                    Ok(text) => {
                        form.fields.insert(name, text);
                    }
                    Err(err) => {
                        form.discard(media).await;
                        return Err(AppError::new(err.status(), err.body_text()));
                    }
                },
            }
        }
        Ok(form)
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    pub fn file_url(&self, name: &str) -> Option<String> {
        self.files.get(name).map(|stored| stored.url.clone())
    }

    /// Remove every stored file of this form.
    pub async fn discard(&self, media: &MediaStore) {
        for stored in self.files.values() {
            media.remove_url(&stored.url).await;
        }
    }

    /// Pass `result` through, discarding the uploads when it failed.
    pub async fn settle<T, E>(&self, media: &MediaStore, result: Result<T, E>) -> Result<T, E> {
        if result.is_err() {
            self.discard(media).await;
        }
        result
    }
}
