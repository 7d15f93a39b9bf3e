//! Data-access and domain services.
//!
//! The reusable core lives in three modules: [`repository`] (generic CRUD
//! over one table), [`toggle`] (relation flips such as likes and
//! subscriptions) and [`aggregate`] (enriched, paginated list reads). The
//! remaining modules are thin, resource-specific helpers built on top.

pub mod aggregate;
pub mod auth;
pub mod dashboard;
pub mod media;
pub mod playlists;
pub mod repository;
pub mod toggle;
pub mod users;

use std::io;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{0}")]
    InvalidArgument(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error(transparent)]
    Storage(#[from] sqlx::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("{0}")]
    Internal(String),
}

pub type ServiceResult<T> = Result<T, ServiceError>;

impl ServiceError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }
}

/// Parse an opaque identifier taken from a path, query or body.
pub fn parse_id(raw: &str, what: &str) -> ServiceResult<Uuid> {
    Uuid::parse_str(raw.trim()).map_err(|_| ServiceError::invalid(format!("Invalid {}", what)))
}

/// Require a non-blank string field and return it trimmed.
pub fn require_text(value: Option<&str>, what: &str) -> ServiceResult<String> {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v.to_string()),
        _ => Err(ServiceError::invalid(format!("{} is required", what))),
    }
}

/// Return true if SQLx error indicates a unique constraint violation.
pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(
        err,
        sqlx::Error::Database(db_err) if db_err.message().to_ascii_lowercase().contains("unique")
    )
}
