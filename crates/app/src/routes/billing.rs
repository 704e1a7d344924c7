use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::Router;
use services::billing::SIGNATURE_HEADER;

use crate::response::{AppError, ok};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/api/webhooks/billing", post(webhook))
}

/// The body is taken as raw bytes: the signature covers the exact payload.
async fn webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, AppError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok());
    let outcome = state
        .services()
        .billing()
        .handle(signature, &body)
        .await
        .inspect_err(|err| tracing::warn!(error = %err, "billing webhook rejected"))?;
    Ok(ok(outcome).into_response())
}
