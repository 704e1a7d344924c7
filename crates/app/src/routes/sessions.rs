use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use services::{SessionId, StartSession};

use crate::extract::CurrentUser;
use crate::response::{AppError, ok};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/sessions", post(start))
        .route("/api/sessions/:id", get(snapshot))
        .route("/api/sessions/:id/answer", post(answer))
        .route("/api/sessions/:id/next", post(next))
}

#[derive(Debug, Deserialize)]
struct AnswerRequest {
    answer: String,
}

fn parse_session_id(raw: &str) -> Result<SessionId, AppError> {
    raw.parse()
        .map_err(|_| AppError::not_found("session not found"))
}

async fn start(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Json(payload): Json<StartSession>,
) -> Result<Response, AppError> {
    let snapshot = state
        .services()
        .practice()
        .start(&user_id, payload)
        .await?;
    Ok((StatusCode::CREATED, ok(snapshot)).into_response())
}

async fn snapshot(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    let id = parse_session_id(&id)?;
    let snapshot = state.services().practice().snapshot(&user_id, id).await?;
    Ok(ok(snapshot).into_response())
}

async fn answer(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(id): Path<String>,
    Json(payload): Json<AnswerRequest>,
) -> Result<Response, AppError> {
    let id = parse_session_id(&id)?;
    let snapshot = state
        .services()
        .practice()
        .check_answer(&user_id, id, &payload.answer)
        .await?;
    Ok(ok(snapshot).into_response())
}

async fn next(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    let id = parse_session_id(&id)?;
    let snapshot = state.services().practice().next(&user_id, id).await?;
    Ok(ok(snapshot).into_response())
}
