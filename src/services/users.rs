//! Account lifecycle: registration, login with refresh-token rotation,
//! profile edits and the public channel profile.

use crate::{
    models::user::{Channel, User},
    services::{
        ServiceError, ServiceResult,
        aggregate::{Enriched, Enrichment, Filter, Pipeline},
        auth::{self, MIN_PASSWORD_LEN, TokenIssuer, TokenKind, TokenPair},
        repository::{FieldValue, Patch, Repository},
        require_text,
        toggle::Relation,
    },
};
use uuid::Uuid;

/// Validated-later input of `POST /users/register`.
#[derive(Debug, Clone, Default)]
pub struct Registration {
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub avatar_url: Option<String>,
    pub cover_image_url: Option<String>,
}

/// Which profile image an upload replaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileImage {
    Avatar,
    CoverImage,
}

impl ProfileImage {
    fn column(self) -> &'static str {
        match self {
            ProfileImage::Avatar => "avatar",
            ProfileImage::CoverImage => "cover_image",
        }
    }
}

fn validate_email(email: &str) -> ServiceResult<()> {
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(()),
        _ => Err(ServiceError::invalid("Invalid email")),
    }
}

fn validate_password(password: &str) -> ServiceResult<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ServiceError::invalid(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }
    Ok(())
}

#[derive(Clone)]
pub struct UserService {
    repo: Repository,
    tokens: TokenIssuer,
}

impl UserService {
    pub fn new(repo: Repository, tokens: TokenIssuer) -> Self {
        Self { repo, tokens }
    }

    pub fn tokens(&self) -> &TokenIssuer {
        &self.tokens
    }

    pub async fn register(&self, reg: Registration) -> ServiceResult<User> {
        let full_name = require_text(reg.full_name.as_deref(), "fullName")?;
        let email = require_text(reg.email.as_deref(), "email")?.to_lowercase();
        let username = require_text(reg.username.as_deref(), "username")?.to_lowercase();
        let password = require_text(reg.password.as_deref(), "password")?;
        let avatar = require_text(reg.avatar_url.as_deref(), "Avatar file")?;

        if username.chars().any(char::is_whitespace) {
            return Err(ServiceError::invalid("Username must not contain whitespace"));
        }
        validate_email(&email)?;
        validate_password(&password)?;

        let taken_name = self
            .repo
            .find_by::<User>("username", username.as_str())
            .await?
            .is_some();
        let taken_email = self
            .repo
            .find_by::<User>("email", email.as_str())
            .await?
            .is_some();
        if taken_name || taken_email {
            return Err(ServiceError::Conflict(
                "User with this email or username already exists".into(),
            ));
        }

        let user: User = self
            .repo
            .create(
                Patch::new()
                    .set("username", username)
                    .set("email", email)
                    .set("full_name", full_name)
                    .set("avatar", avatar)
                    .set("cover_image", reg.cover_image_url.unwrap_or_default())
                    .set("password", auth::hash_password(&password)?),
            )
            .await?;

        tracing::info!(user_id = %user.id, username = %user.username, "user registered");
        Ok(user)
    }

    /// Verify credentials and rotate the stored refresh token.
    pub async fn login(
        &self,
        username: Option<&str>,
        email: Option<&str>,
        password: &str,
    ) -> ServiceResult<(User, TokenPair)> {
        let username = username.map(str::trim).filter(|v| !v.is_empty());
        let email = email.map(str::trim).filter(|v| !v.is_empty());

        let user = match (username, email) {
            (Some(name), _) => {
                self.repo
                    .find_by::<User>("username", name.to_lowercase())
                    .await?
            }
            (None, Some(email)) => self.repo.find_by::<User>("email", email.to_lowercase()).await?,
            (None, None) => {
                return Err(ServiceError::invalid("username or email is required"));
            }
        }
        .ok_or_else(|| ServiceError::not_found("User does not exist"))?;

        if !auth::verify_password(password, &user.password) {
            tracing::warn!(user_id = %user.id, "login rejected: bad password");
            return Err(ServiceError::unauthorized("Invalid user credentials"));
        }

        self.rotate(user).await
    }

    /// Exchange a refresh token for a new pair. The presented token must be
    /// the one currently stored for the user.
    pub async fn refresh(&self, refresh_token: &str) -> ServiceResult<(User, TokenPair)> {
        let claims = self.tokens.verify(refresh_token, TokenKind::Refresh)?;
        let user = self
            .repo
            .get_by_id::<User>(claims.sub)
            .await
            .map_err(|err| match err {
                ServiceError::NotFound(_) => ServiceError::unauthorized("Invalid refresh token"),
                other => other,
            })?;

        if user.refresh_token.as_deref() != Some(refresh_token) {
            tracing::warn!(user_id = %user.id, "refresh rejected: token already rotated");
            return Err(ServiceError::unauthorized("Refresh token is expired or used"));
        }

        self.rotate(user).await
    }

    async fn rotate(&self, user: User) -> ServiceResult<(User, TokenPair)> {
        let pair = self.tokens.issue_pair(user.id, &user.username)?;
        let user = self
            .repo
            .update_fields::<User>(
                user.id,
                Patch::new().set("refresh_token", pair.refresh_token.clone()),
            )
            .await?;
        Ok((user, pair))
    }

    pub async fn logout(&self, user_id: Uuid) -> ServiceResult<()> {
        self.repo
            .update_fields::<User>(user_id, Patch::new().set("refresh_token", FieldValue::Null))
            .await?;
        Ok(())
    }

    pub async fn current(&self, user_id: Uuid) -> ServiceResult<User> {
        self.repo.get_by_id(user_id).await
    }

    pub async fn change_password(
        &self,
        user_id: Uuid,
        old_password: &str,
        new_password: &str,
    ) -> ServiceResult<()> {
        let user = self.repo.get_by_id::<User>(user_id).await?;
        if !auth::verify_password(old_password, &user.password) {
            return Err(ServiceError::invalid("Invalid old password"));
        }
        validate_password(new_password)?;

        self.repo
            .update_fields::<User>(
                user_id,
                Patch::new().set("password", auth::hash_password(new_password)?),
            )
            .await?;
        Ok(())
    }

    pub async fn update_account(
        &self,
        user_id: Uuid,
        full_name: Option<String>,
        email: Option<String>,
    ) -> ServiceResult<User> {
        let email = email
            .map(|e| e.trim().to_lowercase())
            .filter(|e| !e.is_empty());
        if let Some(email) = &email {
            validate_email(email)?;
        }

        self.repo
            .update_fields(
                user_id,
                Patch::new()
                    .text("full_name", full_name)
                    .text("email", email),
            )
            .await
    }

    /// Point the profile image at `url`, returning the user and the URL it
    /// replaced.
    pub async fn set_image(
        &self,
        user_id: Uuid,
        image: ProfileImage,
        url: String,
    ) -> ServiceResult<(User, String)> {
        let before = self.repo.get_by_id::<User>(user_id).await?;
        let previous = match image {
            ProfileImage::Avatar => before.avatar,
            ProfileImage::CoverImage => before.cover_image,
        };
        let user = self
            .repo
            .update_fields(user_id, Patch::new().set(image.column(), url))
            .await?;
        Ok((user, previous))
    }

    /// Public channel page with subscriber counts and whether `viewer`
    /// subscribes.
    pub async fn channel_profile(
        &self,
        username: &str,
        viewer: Option<Uuid>,
    ) -> ServiceResult<Enriched<Channel>> {
        let username = require_text(Some(username), "username")?.to_lowercase();
        Pipeline::new()
            .filter(Filter::Eq("username", username.into()))
            .enrich(Enrichment::Count {
                field: "subscribersCount",
                link: Relation::Subscription.target_link(),
            })
            .enrich(Enrichment::Count {
                field: "channelsSubscribedToCount",
                link: Relation::Subscription.actor_link(),
            })
            .enrich(Enrichment::Flag {
                field: "isSubscribed",
                link: Relation::Subscription.target_link(),
                key: viewer,
            })
            .fetch_one::<Channel>(&self.repo.db)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::toggle::ToggleEngine;
    use std::{sync::Arc, time::Duration};

    async fn service() -> (UserService, Repository) {
        let repo = Repository::new(Arc::new(crate::db::test_pool().await));
        let tokens = TokenIssuer::new(
            "a-secret",
            Duration::from_secs(60),
            "r-secret",
            Duration::from_secs(600),
        );
        (UserService::new(repo.clone(), tokens), repo)
    }

    fn registration(username: &str) -> Registration {
        Registration {
            full_name: Some("Test Person".into()),
            email: Some(format!("{}@Example.com", username)),
            username: Some(username.into()),
            password: Some("hunter2hunter2".into()),
            avatar_url: Some("/media/avatars/x.png".into()),
            cover_image_url: None,
        }
    }

    #[tokio::test]
    async fn register_normalizes_and_hides_credentials() {
        let (users, _) = service().await;
        let user = users.register(registration("MixedCase")).await.unwrap();
        assert_eq!(user.username, "mixedcase");
        assert_eq!(user.email, "mixedcase@example.com");
        assert_eq!(user.cover_image, "");
        assert!(user.password.starts_with("$argon2"));

        let json = serde_json::to_value(&user).unwrap();
        assert!(json.get("password").is_none());
        assert!(json.get("refreshToken").is_none());
        assert_eq!(json["fullName"], "Test Person");
    }

    #[tokio::test]
    async fn register_rejects_duplicates_and_missing_fields() {
        let (users, _) = service().await;
        users.register(registration("taken")).await.unwrap();
        assert!(matches!(
            users.register(registration("taken")).await,
            Err(ServiceError::Conflict(_))
        ));

        let mut missing_avatar = registration("noavatar");
        missing_avatar.avatar_url = None;
        assert!(matches!(
            users.register(missing_avatar).await,
            Err(ServiceError::InvalidArgument(_))
        ));

        let mut short = registration("shortpw");
        short.password = Some("abc".into());
        assert!(matches!(
            users.register(short).await,
            Err(ServiceError::InvalidArgument(_))
        ));
    }

    #[tokio::test]
    async fn login_refresh_and_logout_rotate_tokens() {
        let (users, _) = service().await;
        users.register(registration("rotator")).await.unwrap();

        assert!(matches!(
            users.login(Some("rotator"), None, "wrong-password").await,
            Err(ServiceError::Unauthorized(_))
        ));
        assert!(matches!(
            users.login(Some("ghost"), None, "whatever").await,
            Err(ServiceError::NotFound(_))
        ));

        let (user, pair) = users
            .login(None, Some("ROTATOR@example.com"), "hunter2hunter2")
            .await
            .unwrap();
        assert_eq!(user.refresh_token.as_deref(), Some(pair.refresh_token.as_str()));

        let (_, rotated) = users.refresh(&pair.refresh_token).await.unwrap();
        assert_ne!(rotated.refresh_token, pair.refresh_token);
        assert!(matches!(
            users.refresh(&pair.refresh_token).await,
            Err(ServiceError::Unauthorized(_))
        ));

        users.logout(user.id).await.unwrap();
        assert!(users.current(user.id).await.unwrap().refresh_token.is_none());
        assert!(users.refresh(&rotated.refresh_token).await.is_err());
    }

    #[tokio::test]
    async fn change_password_requires_old_password() {
        let (users, _) = service().await;
        let user = users.register(registration("changer")).await.unwrap();

        assert!(matches!(
            users.change_password(user.id, "nope-nope", "newpassword1").await,
            Err(ServiceError::InvalidArgument(_))
        ));
        users
            .change_password(user.id, "hunter2hunter2", "newpassword1")
            .await
            .unwrap();
        assert!(users.login(Some("changer"), None, "newpassword1").await.is_ok());
    }

    #[tokio::test]
    async fn update_account_needs_a_field() {
        let (users, _) = service().await;
        let user = users.register(registration("editor")).await.unwrap();

        assert!(matches!(
            users.update_account(user.id, Some("  ".into()), None).await,
            Err(ServiceError::InvalidArgument(_))
        ));
        let updated = users
            .update_account(user.id, Some("New Name".into()), None)
            .await
            .unwrap();
        assert_eq!(updated.full_name, "New Name");
        assert_eq!(updated.email, "editor@example.com");
    }

    #[tokio::test]
    async fn channel_profile_counts_subscriptions() {
        let (users, repo) = service().await;
        let channel = users.register(registration("streamer")).await.unwrap();
        let viewer = users.register(registration("watcher")).await.unwrap();
        ToggleEngine::new(repo.db.clone())
            .toggle(Relation::Subscription, channel.id, viewer.id)
            .await
            .unwrap();

        let seen_by_viewer = users
            .channel_profile("Streamer", Some(viewer.id))
            .await
            .unwrap();
        assert_eq!(seen_by_viewer.count("subscribersCount"), 1);
        assert_eq!(seen_by_viewer.count("channelsSubscribedToCount"), 0);
        assert!(seen_by_viewer.flag("isSubscribed"));

        let anonymous = users.channel_profile("streamer", None).await.unwrap();
        assert!(!anonymous.flag("isSubscribed"));

        let viewer_page = users.channel_profile("watcher", None).await.unwrap();
        assert_eq!(viewer_page.count("channelsSubscribedToCount"), 1);
    }
}
