use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get};
use axum::Router;
use quiz_core::model::MistakeId;
use serde::Deserialize;
use serde_json::json;

use crate::extract::CurrentUser;
use crate::response::{AppError, ok};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/mistakes", get(list))
        .route("/api/mistakes/:id", delete(remove))
}

#[derive(Debug, Deserialize)]
struct ListQuery {
    #[serde(default)]
    limit: Option<u32>,
}

async fn list(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Query(query): Query<ListQuery>,
) -> Result<Response, AppError> {
    let mistakes = state
        .services()
        .mistakes()
        .recent(&user_id, query.limit)
        .await?;
    Ok(ok(mistakes).into_response())
}

async fn remove(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(id): Path<u64>,
) -> Result<Response, AppError> {
    let id = MistakeId::new(id);
    state.services().mistakes().delete(&user_id, id).await?;
    Ok(ok(json!({ "deleted": id })).into_response())
}
