//! HTTP handlers, one module per resource.

pub mod comment_handlers;
pub mod dashboard_handlers;
pub mod health_handlers;
pub mod like_handlers;
pub mod media_handlers;
pub mod playlist_handlers;
pub mod subscription_handlers;
pub mod tweet_handlers;
pub mod user_handlers;
pub mod video_handlers;

use crate::services::aggregate::PageSpec;
use serde::Deserialize;

/// `?page=&limit=` accepted by every list endpoint.
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl PageQuery {
    pub fn spec(&self) -> PageSpec {
        PageSpec::new(self.page, self.limit)
    }
}

/// JSON body carrying a single `content` field (comments, tweets).
#[derive(Debug, Deserialize)]
pub struct ContentBody {
    pub content: Option<String>,
}
