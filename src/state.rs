use crate::{
    config::AppConfig,
    services::{
        auth::TokenIssuer, media::MediaStore, playlists::PlaylistService, repository::Repository,
        toggle::ToggleEngine, users::UserService,
    },
};
use sqlx::SqlitePool;
use std::sync::Arc;

/// Shared handles passed to every handler. Cloning is cheap.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<SqlitePool>,
    pub repo: Repository,
    pub toggles: ToggleEngine,
    pub media: MediaStore,
    pub users: UserService,
    pub playlists: PlaylistService,
}

impl AppState {
    pub fn new(db: Arc<SqlitePool>, cfg: &AppConfig) -> Self {
        let tokens = TokenIssuer::new(
            cfg.access_token_secret.clone(),
            cfg.access_token_ttl,
            cfg.refresh_token_secret.clone(),
            cfg.refresh_token_ttl,
        );
        Self::with_parts(db, MediaStore::new(&cfg.media_dir), tokens)
    }

    pub fn with_parts(db: Arc<SqlitePool>, media: MediaStore, tokens: TokenIssuer) -> Self {
        let repo = Repository::new(db.clone());
        Self {
            toggles: ToggleEngine::new(db.clone()),
            users: UserService::new(repo.clone(), tokens),
            playlists: PlaylistService::new(repo.clone()),
            repo,
            media,
            db,
        }
    }

    pub fn tokens(&self) -> &TokenIssuer {
        self.users.tokens()
    }
}
