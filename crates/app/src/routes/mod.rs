mod ai;
mod billing;
mod health;
mod mistakes;
mod progress;
mod sessions;
mod topics;

use axum::Router;
use axum::response::{IntoResponse, Response};

use crate::response::AppError;
use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .merge(health::router())
        .merge(ai::router())
        .merge(billing::router())
        .merge(sessions::router())
        .merge(topics::router())
        .merge(mistakes::router())
        .merge(progress::router())
        .fallback(fallback_handler)
        .with_state(state)
}

async fn fallback_handler() -> Response {
    AppError::not_found("route not found").into_response()
}
