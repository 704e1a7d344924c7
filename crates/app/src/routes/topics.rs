use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use quiz_core::model::{Subject, TopicDraft, TopicId};
use serde::Deserialize;
use serde_json::json;
use services::SeedQuestionDraft;

use crate::response::{AppError, ok};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/topics", get(list).post(create))
        .route("/api/topics/:id", put(update).delete(remove))
        .route("/api/topics/:id/seeds", post(add_seed))
}

#[derive(Debug, Deserialize)]
struct ListQuery {
    #[serde(default)]
    subject: Option<String>,
}

async fn list(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Response, AppError> {
    let subject = query
        .subject
        .filter(|raw| !raw.trim().is_empty())
        .map(|raw| raw.parse::<Subject>())
        .transpose()
        .map_err(|err| AppError::validation(err.to_string()))?;
    let topics = state.services().topics().list(subject).await?;
    Ok(ok(topics).into_response())
}

async fn create(
    State(state): State<AppState>,
    Json(draft): Json<TopicDraft>,
) -> Result<Response, AppError> {
    let topic = state.services().topics().create(draft).await?;
    Ok((StatusCode::CREATED, ok(topic)).into_response())
}

async fn update(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    Json(draft): Json<TopicDraft>,
) -> Result<Response, AppError> {
    let topic = state
        .services()
        .topics()
        .update(TopicId::new(id), draft)
        .await?;
    Ok(ok(topic).into_response())
}

async fn remove(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<Response, AppError> {
    let id = TopicId::new(id);
    state.services().topics().delete(id).await?;
    Ok(ok(json!({ "deleted": id })).into_response())
}

async fn add_seed(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    Json(draft): Json<SeedQuestionDraft>,
) -> Result<Response, AppError> {
    let seed = state
        .services()
        .topics()
        .add_seed(TopicId::new(id), draft)
        .await?;
    Ok((StatusCode::CREATED, ok(seed)).into_response())
}
