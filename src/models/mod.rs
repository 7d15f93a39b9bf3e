//! Core data models for the video platform.
//!
//! Entity structs map to tables via `sqlx::FromRow` and serialize as
//! camelCase JSON via `serde`. Credential columns never serialize.

pub mod comment;
pub mod dashboard;
pub mod like;
pub mod playlist;
pub mod tweet;
pub mod user;
pub mod video;
