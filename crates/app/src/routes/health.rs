use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;

use crate::response::ok;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/api/env-check", get(env_check))
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    uptime: u64,
    timestamp: String,
}

async fn health(State(state): State<AppState>) -> Response {
    Json(HealthResponse {
        status: "ok",
        uptime: state.uptime_seconds(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
    .into_response()
}

/// Which optional integrations are wired up. Never echoes secrets.
#[derive(Debug, Serialize)]
struct EnvCheck {
    ai_configured: bool,
    model: Option<String>,
    webhook_configured: bool,
    pacer_interval_ms: u64,
    free_daily_limit: u32,
    quota_utc_offset_minutes: i32,
}

async fn env_check(State(state): State<AppState>) -> Response {
    let services = state.services();
    let ai = services.ai_client();
    let quota = services.quota();
    let policy = quota.policy();

    let check = EnvCheck {
        ai_configured: ai.enabled(),
        model: ai.model().map(str::to_owned),
        webhook_configured: services.billing().is_configured(),
        pacer_interval_ms: u64::try_from(ai.pacer().min_interval().as_millis())
            .unwrap_or(u64::MAX),
        free_daily_limit: policy.limit_for(None),
        quota_utc_offset_minutes: policy.offset().local_minus_utc() / 60,
    };
    ok(check).into_response()
}
