//! Route table of the API.
//!
//! ## Structure
//! - `/users/...`          accounts, sessions, channel profiles
//! - `/videos/...`         upload, list, detail, owner edits, publish toggle
//! - `/comments/...`       per-video comments
//! - `/tweets/...`         short text posts
//! - `/likes/...`          like toggles and the liked-videos list
//! - `/subscriptions/...`  subscribe toggle, subscriptions, subscriber count
//! - `/playlists/...`      playlists and their membership
//! - `/dashboard/...`      channel owner stats
//! - `/media/{*key}`       stored uploads
//! - `/healthz`, `/readyz` probes

use crate::{
    errors::AppError,
    handlers::{
        comment_handlers::{add_comment, delete_comment, list_comments, update_comment},
        dashboard_handlers::{channel_stats, channel_videos},
        health_handlers::{healthz, readyz},
        like_handlers::{liked_videos, toggle_comment_like, toggle_tweet_like, toggle_video_like},
        media_handlers::get_media,
        playlist_handlers::{
            add_video, create_playlist, delete_playlist, get_playlist, remove_video,
            update_playlist, user_playlists,
        },
        subscription_handlers::{subscribed_channels, subscriber_count, toggle_subscription},
        tweet_handlers::{create_tweet, delete_tweet, update_tweet, user_tweets},
        user_handlers::{
            change_password, channel_profile, current_user, login, logout, refresh_token,
            register, update_account, update_avatar, update_cover_image,
        },
        video_handlers::{
            delete_video, get_video, list_videos, publish_video, toggle_publish, update_video,
        },
    },
    state::AppState,
};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::StatusCode,
    routing::{get, patch, post},
};
use std::time::Duration;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

/// Uploads are streamed to disk, so the default 2 MB body cap is lifted.
const MAX_UPLOAD_BYTES: usize = 1024 * 1024 * 1024;

/// Build the route table. The router carries `AppState` to all handlers.
pub fn routes() -> Router<AppState> {
    Router::new()
        // health endpoints (mounted at root)
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/media/{*key}", get(get_media))
        .nest("/users", user_routes())
        .route("/videos", get(list_videos).post(publish_video))
        .route(
            "/videos/{videoId}",
            get(get_video).patch(update_video).delete(delete_video),
        )
        .route("/videos/toggle/publish/{videoId}", patch(toggle_publish))
        .route("/comments/{videoId}", get(list_comments).post(add_comment))
        .route(
            "/comments/c/{commentId}",
            patch(update_comment).delete(delete_comment),
        )
        .route("/tweets", post(create_tweet))
        .route("/tweets/user/{userId}", get(user_tweets))
        .route("/tweets/{tweetId}", patch(update_tweet).delete(delete_tweet))
        .route("/likes/toggle/v/{videoId}", post(toggle_video_like))
        .route("/likes/toggle/c/{commentId}", post(toggle_comment_like))
        .route("/likes/toggle/t/{tweetId}", post(toggle_tweet_like))
        .route("/likes/videos", get(liked_videos))
        .route(
            "/subscriptions/c/{channelId}",
            get(subscribed_channels).post(toggle_subscription),
        )
        .route("/subscriptions/u/{channelId}", get(subscriber_count))
        .route("/playlists", post(create_playlist))
        .route("/playlists/user/{userId}", get(user_playlists))
        .route(
            "/playlists/{playlistId}",
            get(get_playlist)
                .patch(update_playlist)
                .delete(delete_playlist),
        )
        .route("/playlists/add/{videoId}/{playlistId}", patch(add_video))
        .route("/playlists/remove/{videoId}/{playlistId}", patch(remove_video))
        .route("/dashboard/stats", get(channel_stats))
        .route("/dashboard/videos", get(channel_videos))
        .fallback(route_not_found)
}

fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/refresh-token", post(refresh_token))
        .route("/change-password", post(change_password))
        .route("/current-user", get(current_user))
        .route("/update-account", patch(update_account))
        .route("/avatar", patch(update_avatar))
        .route("/cover-image", patch(update_cover_image))
        .route("/c/{username}", get(channel_profile))
}

async fn route_not_found() -> AppError {
    AppError::new(StatusCode::NOT_FOUND, "Route not found")
}

/// The full application: routes, shared state, request tracing and a
/// per-request deadline.
pub fn app(state: AppState, request_timeout: Duration) -> Router {
    routes()
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            request_timeout,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::{auth::TokenIssuer, media::MediaStore};
    use axum::{
        body::Body,
        http::{Request, header},
    };
    use http_body_util::BodyExt;
    use serde_json::{Value, json};
    use std::sync::Arc;
    use tower::ServiceExt;
    use uuid::Uuid;

    const BOUNDARY: &str = "videotube-test-boundary";

    async fn test_app() -> (Router, AppState) {
        let db = Arc::new(crate::db::test_pool().await);
        let media_dir = std::env::temp_dir().join(format!("videotube-routes-{}", Uuid::new_v4()));
        std::fs::create_dir_all(&media_dir).unwrap();
        let tokens = TokenIssuer::new(
            "test-access",
            Duration::from_secs(300),
            "test-refresh",
            Duration::from_secs(3000),
        );
        let state = AppState::with_parts(db, MediaStore::new(media_dir), tokens);
        (app(state.clone(), Duration::from_secs(30)), state)
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        // media downloads are not JSON
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    fn json_request(method: &str, uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    fn empty_request(method: &str, uri: &str, token: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        builder.body(Body::empty()).unwrap()
    }

    /// `(name, file name, content)`; text parts have no file name.
    fn multipart_request(
        method: &str,
        uri: &str,
        token: Option<&str>,
        parts: &[(&str, Option<&str>, &str)],
    ) -> Request<Body> {
        let mut body = Vec::new();
        for (name, file_name, content) in parts {
            body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
            match file_name {
                Some(file_name) => body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: application/octet-stream\r\n\r\n",
                        name, file_name
                    )
                    .as_bytes(),
                ),
                None => body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name).as_bytes(),
                ),
            }
            body.extend_from_slice(content.as_bytes());
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());

        let mut builder = Request::builder().method(method).uri(uri).header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        );
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        builder.body(Body::from(body)).unwrap()
    }

    /// Register and log in, returning `(user id, access token)`.
    async fn sign_up(app: &Router, username: &str) -> (String, String) {
        let email = format!("{}@example.com", username);
        let (status, body) = send(
            app,
            multipart_request(
                "POST",
                "/users/register",
                None,
                &[
                    ("fullName", None, "Test User"),
                    ("email", None, email.as_str()),
                    ("username", None, username),
                    ("password", None, "long-enough-pw"),
                    ("avatar", Some("me.png"), "PNG fake"),
                ],
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");

        let (status, body) = send(
            app,
            json_request(
                "POST",
                "/users/login",
                None,
                json!({ "username": username, "password": "long-enough-pw" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        (
            body["data"]["user"]["id"].as_str().unwrap().to_string(),
            body["data"]["accessToken"].as_str().unwrap().to_string(),
        )
    }

    #[tokio::test]
    async fn health_probes_answer() {
        let (app, _) = test_app().await;
        let (status, body) = send(&app, empty_request("GET", "/healthz", None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");

        let (status, body) = send(&app, empty_request("GET", "/readyz", None)).await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["checks"]["sqlite"]["ok"], true);
    }

    #[tokio::test]
    async fn registration_hides_credentials_and_sets_cookies_on_login() {
        let (app, state) = test_app().await;
        let (status, body) = send(
            &app,
            multipart_request(
                "POST",
                "/users/register",
                None,
                &[
                    ("fullName", None, "Casey"),
                    ("email", None, "casey@example.com"),
                    ("username", None, "Casey"),
                    ("password", None, "long-enough-pw"),
                    ("avatar", Some("casey.png"), "png-bytes"),
                ],
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["statusCode"], 201);
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["username"], "casey");
        assert!(body["data"].get("password").is_none());

        let avatar = body["data"]["avatar"].as_str().unwrap();
        let key = avatar.strip_prefix("/media/").unwrap();
        assert!(state.media.open(key).await.is_ok());

        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/users/login",
                None,
                json!({ "email": "casey@example.com", "password": "long-enough-pw" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let cookies: Vec<String> = response
            .headers()
            .get_all(header::SET_COOKIE)
            .iter()
            .map(|v| v.to_str().unwrap().to_string())
            .collect();
        assert!(cookies.iter().any(|c| c.starts_with("accessToken=") && c.contains("HttpOnly") && c.contains("Secure")));
        assert!(cookies.iter().any(|c| c.starts_with("refreshToken=")));
    }

    #[tokio::test]
    async fn registration_without_avatar_is_rejected() {
        let (app, _) = test_app().await;
        let (status, body) = send(
            &app,
            multipart_request(
                "POST",
                "/users/register",
                None,
                &[
                    ("fullName", None, "No Avatar"),
                    ("email", None, "na@example.com"),
                    ("username", None, "noavatar"),
                    ("password", None, "long-enough-pw"),
                ],
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Avatar file is required");
    }

    #[tokio::test]
    async fn mutations_require_an_actor() {
        let (app, _) = test_app().await;
        let (status, body) = send(
            &app,
            json_request("POST", "/tweets", None, json!({ "content": "hi" })),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["success"], false);
        assert_eq!(body["errors"], json!([]));

        let (status, _) = send(
            &app,
            json_request("POST", "/tweets", Some("not-a-jwt"), json!({ "content": "hi" })),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn malformed_input_gets_the_error_envelope() {
        let (app, _) = test_app().await;
        let (_, token) = sign_up(&app, "sloppy").await;

        let bad_json = Request::builder()
            .method("POST")
            .uri("/tweets")
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .body(Body::from("{not json"))
            .unwrap();
        let (status, body) = send(&app, bad_json).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);

        let (status, body) = send(&app, empty_request("GET", "/videos?page=abc", None)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["statusCode"], 400);

        let (status, body) = send(
            &app,
            empty_request("POST", "/likes/toggle/v/not-an-id", Some(&token)),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Invalid videoId");

        let (status, body) = send(&app, empty_request("GET", "/no/such/route", None)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn upload_routes_reject_non_multipart_bodies() {
        let (app, _) = test_app().await;
        let (_, token) = sign_up(&app, "uploader").await;

        let (status, body) = send(
            &app,
            json_request("POST", "/videos", Some(&token), json!({ "title": "nope" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert_eq!(body["statusCode"], 400);
    }

    #[tokio::test]
    async fn stalled_uploads_hit_the_request_deadline() {
        let (app, state) = test_app().await;
        let (_, token) = sign_up(&app, "stalled").await;
        let impatient = super::app(state, Duration::from_millis(100));

        let stalled = Request::builder()
            .method("POST")
            .uri("/videos")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .body(Body::from_stream(futures::stream::pending::<
                Result<bytes::Bytes, std::io::Error>,
            >()))
            .unwrap();
        let response = impatient.oneshot(stalled).await.unwrap();
        assert_eq!(response.status(), StatusCode::REQUEST_TIMEOUT);
    }

    #[tokio::test]
    async fn draft_comments_are_owner_only() {
        let (app, _) = test_app().await;
        let (_, owner) = sign_up(&app, "drafter").await;
        let (_, stranger) = sign_up(&app, "stranger").await;

        let (status, body) = send(
            &app,
            multipart_request(
                "POST",
                "/videos",
                Some(&owner),
                &[
                    ("title", None, "Rough cut"),
                    ("description", None, "not ready"),
                    ("videoFile", Some("rough.mp4"), "fake video bytes"),
                    ("thumbnail", Some("rough.jpg"), "fake jpg"),
                ],
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        let video_id = body["data"]["id"].as_str().unwrap().to_string();
        let publish_uri = format!("/videos/toggle/publish/{}", video_id);
        let (_, body) = send(&app, empty_request("PATCH", &publish_uri, Some(&owner))).await;
        assert_eq!(body["data"]["isPublished"], false);

        let comments_uri = format!("/comments/{}", video_id);
        let (status, _) = send(
            &app,
            json_request("POST", &comments_uri, Some(&stranger), json!({ "content": "first!" })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = send(&app, empty_request("GET", &comments_uri, Some(&stranger))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = send(&app, empty_request("GET", &comments_uri, None)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = send(
            &app,
            json_request("POST", &comments_uri, Some(&owner), json!({ "content": "note to self" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let (status, body) = send(&app, empty_request("GET", &comments_uri, Some(&owner))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"][0]["content"], "note to self");

        send(&app, empty_request("PATCH", &publish_uri, Some(&owner))).await;
        let (_, body) = send(&app, empty_request("GET", &comments_uri, None)).await;
        assert_eq!(body["data"].as_array().map(Vec::len), Some(1));
    }

    #[tokio::test]
    async fn tweet_like_toggle_round_trip() {
        let (app, _) = test_app().await;
        let (author_id, author) = sign_up(&app, "author").await;
        let (_, reader) = sign_up(&app, "reader").await;

        let (status, body) = send(
            &app,
            json_request("POST", "/tweets", Some(&author), json!({ "content": "  hello world " })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["data"]["content"], "hello world");
        let tweet_id = body["data"]["id"].as_str().unwrap().to_string();

        let like_uri = format!("/likes/toggle/t/{}", tweet_id);
        let (_, first) = send(&app, empty_request("POST", &like_uri, Some(&reader))).await;
        assert_eq!(first["data"], json!({ "isLiked": true, "likesCount": 1 }));
        let (_, second) = send(&app, empty_request("POST", &like_uri, Some(&reader))).await;
        assert_eq!(second["data"], json!({ "isLiked": false, "likesCount": 0 }));
        send(&app, empty_request("POST", &like_uri, Some(&reader))).await;

        let list_uri = format!("/tweets/user/{}", author_id);
        let (status, body) = send(&app, empty_request("GET", &list_uri, Some(&reader))).await;
        assert_eq!(status, StatusCode::OK);
        let tweets = body["data"].as_array().unwrap();
        assert_eq!(tweets.len(), 1);
        assert_eq!(tweets[0]["likesCount"], 1);
        assert_eq!(tweets[0]["isLiked"], true);
        assert_eq!(tweets[0]["owner"]["username"], "author");

        let edit_uri = format!("/tweets/{}", tweet_id);
        let (status, _) = send(
            &app,
            json_request("PATCH", &edit_uri, Some(&reader), json!({ "content": "hijacked" })),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, body) = send(
            &app,
            json_request("PATCH", &edit_uri, Some(&author), json!({ "content": "   " })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
    }

    #[tokio::test]
    async fn video_lifecycle_over_http() {
        let (app, _) = test_app().await;
        let (owner_id, owner) = sign_up(&app, "director").await;
        let (_, viewer) = sign_up(&app, "audience").await;

        let (status, body) = send(
            &app,
            multipart_request(
                "POST",
                "/videos",
                Some(&owner),
                &[
                    ("title", None, "First cut"),
                    ("description", None, "a short film"),
                    ("duration", None, "61.5"),
                    ("videoFile", Some("cut.mp4"), "fake video bytes"),
                    ("thumbnail", Some("cut.jpg"), "fake jpg"),
                ],
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        let video_id = body["data"]["id"].as_str().unwrap().to_string();
        let video_url = body["data"]["videoFile"].as_str().unwrap().to_string();

        let (status, _) = send(&app, empty_request("GET", &video_url, None)).await;
        assert_eq!(status, StatusCode::OK);

        let detail_uri = format!("/videos/{}", video_id);
        let (_, body) = send(&app, empty_request("GET", &detail_uri, Some(&viewer))).await;
        assert_eq!(body["data"]["views"], 1);
        assert_eq!(body["data"]["owner"]["username"], "director");
        assert_eq!(body["data"]["likesCount"], 0);

        let publish_uri = format!("/videos/toggle/publish/{}", video_id);
        let (status, _) = send(&app, empty_request("PATCH", &publish_uri, Some(&viewer))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        let (_, body) = send(&app, empty_request("PATCH", &publish_uri, Some(&owner))).await;
        assert_eq!(body["data"]["isPublished"], false);

        let (status, _) = send(&app, empty_request("GET", &detail_uri, Some(&viewer))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = send(&app, empty_request("GET", &detail_uri, Some(&owner))).await;
        assert_eq!(status, StatusCode::OK);

        let list_uri = format!("/videos?userId={}", owner_id);
        let (_, body) = send(&app, empty_request("GET", &list_uri, None)).await;
        assert_eq!(body["data"], json!([]));
        assert_eq!(body["success"], true);

        let (_, body) = send(&app, empty_request("GET", "/dashboard/stats", Some(&owner))).await;
        assert_eq!(body["data"]["totalVideos"], 1);
        assert_eq!(body["data"]["totalViews"], 2);

        let (status, _) = send(&app, empty_request("DELETE", &detail_uri, Some(&owner))).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = send(&app, empty_request("GET", &video_url, None)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn subscriptions_and_channel_profile() {
        let (app, _) = test_app().await;
        let (channel_id, _) = sign_up(&app, "broadcaster").await;
        let (fan_id, fan) = sign_up(&app, "follower").await;

        let toggle_uri = format!("/subscriptions/c/{}", channel_id);
        let (_, body) = send(&app, empty_request("POST", &toggle_uri, Some(&fan))).await;
        assert_eq!(body["data"], json!({ "isSubscribed": true, "subscribersCount": 1 }));

        let (_, body) = send(
            &app,
            empty_request("GET", &format!("/subscriptions/u/{}", channel_id), None),
        )
        .await;
        assert_eq!(body["data"], 1);

        let (_, body) = send(
            &app,
            empty_request("GET", &format!("/subscriptions/c/{}", fan_id), None),
        )
        .await;
        assert_eq!(body["data"][0]["username"], "broadcaster");

        let (_, body) = send(&app, empty_request("GET", "/users/c/broadcaster", Some(&fan))).await;
        assert_eq!(body["data"]["subscribersCount"], 1);
        assert_eq!(body["data"]["isSubscribed"], true);
        assert!(body["data"].get("email").is_none());

        let (status, _) = send(
            &app,
            empty_request("POST", &format!("/subscriptions/c/{}", fan_id), Some(&fan)),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn deleting_a_missing_playlist_is_not_found() {
        let (app, _) = test_app().await;
        let (_, owner) = sign_up(&app, "lister").await;

        let (status, body) = send(
            &app,
            json_request("POST", "/playlists", Some(&owner), json!({ "name": "Later" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let playlist_id = body["data"]["id"].as_str().unwrap().to_string();

        let missing = format!("/playlists/{}", Uuid::new_v4());
        let (status, body) = send(&app, empty_request("DELETE", &missing, Some(&owner))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["message"], "Playlist not found");

        let (status, body) = send(
            &app,
            empty_request("GET", &format!("/playlists/{}", playlist_id), None),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["name"], "Later");
        assert_eq!(body["data"]["videos"], json!([]));
    }
}
