//! Health & readiness handlers.
//!
//! - GET /healthz  -> liveness, no I/O
//! - GET /readyz   -> database round trip plus a media directory probe

use crate::state::AppState;
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use std::{collections::BTreeMap, path::Path};
use tokio::fs;
use uuid::Uuid;

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
}

#[derive(Serialize)]
struct ReadyResponse {
    status: &'static str,
    checks: BTreeMap<&'static str, CheckStatus>,
}

#[derive(Serialize)]
struct CheckStatus {
    ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl From<Result<(), String>> for CheckStatus {
    fn from(result: Result<(), String>) -> Self {
        match result {
            Ok(()) => CheckStatus { ok: true, error: None },
            Err(error) => CheckStatus {
                ok: false,
                error: Some(error),
            },
        }
    }
}

/// `GET /healthz`
pub async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, Json(HealthResponse { status: "ok" }))
}

/// `GET /readyz`: 200 when every check passes, 503 otherwise.
pub async fn readyz(State(state): State<AppState>) -> impl IntoResponse {
    let mut checks = BTreeMap::new();
    checks.insert("sqlite", CheckStatus::from(check_sqlite(&state).await));
    checks.insert("media", CheckStatus::from(check_media_dir(&state.media.base_path).await));

    let ready = checks.values().all(|check| check.ok);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    let body = ReadyResponse {
        status: if ready { "ok" } else { "error" },
        checks,
    };
    (status, Json(body))
}

async fn check_sqlite(state: &AppState) -> Result<(), String> {
    match sqlx::query_scalar::<_, i64>("SELECT 1")
        .fetch_one(&*state.db)
        .await
    {
        Ok(1) => Ok(()),
        Ok(v) => Err(format!("unexpected result: {}", v)),
        Err(e) => Err(format!("error: {}", e)),
    }
}

/// Write, read back and delete a probe file under the media directory.
async fn check_media_dir(base: &Path) -> Result<(), String> {
    let probe = base.join(format!(".readyz-{}", Uuid::new_v4()));
    fs::write(&probe, b"readyz")
        .await
        .map_err(|e| format!("could not write probe file: {}", e))?;

    let read = fs::read(&probe).await;
    let _ = fs::remove_file(&probe).await;
    match read {
        Ok(bytes) if bytes == b"readyz" => Ok(()),
        Ok(_) => Err("probe content mismatch".to_string()),
        Err(e) => Err(format!("could not read probe file: {}", e)),
    }
}
