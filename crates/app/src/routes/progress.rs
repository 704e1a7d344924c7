use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;

use crate::extract::CurrentUser;
use crate::response::{AppError, ok};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/daily-tasks", get(daily_tasks))
        .route("/api/ability", get(ability))
        .route("/api/dashboard", get(dashboard))
}

async fn daily_tasks(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
) -> Result<Response, AppError> {
    let tasks = state.services().quota().today(&user_id).await?;
    Ok(ok(tasks).into_response())
}

async fn ability(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
) -> Result<Response, AppError> {
    let scores = state.services().abilities().list(&user_id).await?;
    Ok(ok(scores).into_response())
}

async fn dashboard(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
) -> Result<Response, AppError> {
    let dashboard = state.services().dashboard().for_user(&user_id).await?;
    Ok(ok(dashboard).into_response())
}
