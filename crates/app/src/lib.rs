#![forbid(unsafe_code)]

pub mod config;
pub mod extract;
pub mod logging;
pub mod response;
pub mod routes;
pub mod seed;
pub mod state;

use std::any::Any;

use axum::Router;
use axum::response::{IntoResponse, Response};
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::response::AppError;
use crate::state::AppState;

/// Full HTTP application: routes plus tracing, CORS and panic recovery.
pub fn app(state: AppState) -> Router {
    routes::router(state)
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

fn panic_response(payload: Box<dyn Any + Send + 'static>) -> Response {
    let detail = payload
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| payload.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    AppError::internal(format!("handler panicked: {detail}")).into_response()
}
