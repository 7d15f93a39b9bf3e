//! Users, their public channel view and the embedded owner profile.

use crate::services::repository::Resource;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

/// A registered account.
///
/// The password hash and the refresh token are loaded for authentication
/// but never leave the process.
#[derive(Serialize, Clone, FromRow, Debug)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,

    /// Unique, stored lowercased.
    pub username: String,

    pub email: String,

    pub full_name: String,

    /// URL of the avatar image.
    pub avatar: String,

    /// URL of the cover image, empty when none was uploaded.
    pub cover_image: String,

    /// Argon2 PHC string.
    #[serde(skip_serializing)]
    pub password: String,

    /// The one refresh token currently accepted for this user.
    #[serde(skip_serializing)]
    pub refresh_token: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Resource for User {
    const TABLE: &'static str = "users";
    const LABEL: &'static str = "User";
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "username",
        "email",
        "full_name",
        "avatar",
        "cover_image",
        "password",
        "refresh_token",
        "created_at",
        "updated_at",
    ];
}

/// Public projection of a user row, read without credential columns.
#[derive(Serialize, Clone, FromRow, Debug)]
#[serde(rename_all = "camelCase")]
pub struct Channel {
    pub id: Uuid,
    pub username: String,
    pub full_name: String,
    pub avatar: String,
    pub cover_image: String,
    pub created_at: DateTime<Utc>,
}

impl Resource for Channel {
    const TABLE: &'static str = "users";
    const LABEL: &'static str = "Channel";
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "username",
        "full_name",
        "avatar",
        "cover_image",
        "created_at",
    ];
}

/// Owner fields embedded into enriched rows.
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct OwnerProfile {
    pub username: String,
    pub full_name: String,
    pub avatar: String,
}
