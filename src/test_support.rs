//! Row fixtures shared by the test modules.

use crate::{
    models::{comment::Comment, tweet::Tweet, user::User, video::Video},
    services::repository::{Patch, Repository},
};
use uuid::Uuid;

pub async fn seed_user(repo: &Repository, username: &str) -> User {
    repo.create(
        Patch::new()
            .set("username", username)
            .set("email", format!("{}@example.com", username))
            .set("full_name", format!("{} Example", username))
            .set("avatar", format!("/media/avatars/{}.png", username))
            .set("password", "not-a-real-hash")
            .set("refresh_token", "stored-refresh-token"),
    )
    .await
    .expect("seed user")
}

pub async fn seed_video(repo: &Repository, owner: Uuid, title: &str) -> Video {
    repo.create(
        Patch::new()
            .set("video_file", format!("/media/videos/{}.mp4", title))
            .set("thumbnail", format!("/media/thumbnails/{}.png", title))
            .set("title", title)
            .set("description", format!("about {}", title))
            .set("duration", 12.5)
            .set("owner_id", owner),
    )
    .await
    .expect("seed video")
}

pub async fn seed_tweet(repo: &Repository, owner: Uuid, content: &str) -> Tweet {
    repo.create(Patch::new().set("content", content).set("owner_id", owner))
        .await
        .expect("seed tweet")
}

pub async fn seed_comment(repo: &Repository, video: Uuid, owner: Uuid, content: &str) -> Comment {
    repo.create(
        Patch::new()
            .set("content", content)
            .set("video_id", video)
            .set("owner_id", owner),
    )
    .await
    .expect("seed comment")
}
