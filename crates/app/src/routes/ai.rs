use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use quiz_core::model::{Question, QuestionSource, Subject, TopicId};
use serde::{Deserialize, Serialize};
use services::{GenerationRequest, ImageAttachment, SeedQuestionDraft};

use crate::extract::CurrentUser;
use crate::response::{AppError, ok};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/generate", post(generate_text))
        .route("/api/questions/generate", post(generate_questions))
}

//
// ─── TEXT / VISION PROXY ───────────────────────────────────────────────────────
//

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ImagePayload {
    #[serde(default)]
    mime_type: String,
    #[serde(alias = "base64")]
    data: String,
}

#[derive(Debug, Deserialize)]
struct GenerateTextRequest {
    prompt: String,
    #[serde(default)]
    image: Option<ImagePayload>,
}

#[derive(Debug, Serialize)]
struct GenerateTextResponse {
    text: String,
}

async fn generate_text(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Json(payload): Json<GenerateTextRequest>,
) -> Result<Response, AppError> {
    if payload.prompt.trim().is_empty() {
        return Err(AppError::validation("prompt cannot be empty"));
    }
    let image = payload.image.map(|image| ImageAttachment {
        mime_type: image.mime_type,
        data_base64: image.data,
    });

    tracing::debug!(user_id = %user_id, vision = image.is_some(), "proxying completion");
    let text = state
        .services()
        .ai_client()
        .complete(&payload.prompt, image.as_ref())
        .await?;
    Ok(ok(GenerateTextResponse { text }).into_response())
}

//
// ─── QUESTION GENERATION ───────────────────────────────────────────────────────
//

#[derive(Debug, Deserialize)]
struct GenerateQuestionsRequest {
    #[serde(default)]
    subject: Option<Subject>,
    #[serde(default)]
    topic_id: Option<TopicId>,
    #[serde(default)]
    seed: Option<SeedQuestionDraft>,
    #[serde(default)]
    count: Option<u32>,
}

#[derive(Debug, Serialize)]
struct GenerateQuestionsResponse {
    questions: Vec<Question>,
}

/// One call spends one unit of the subject's daily quota, however many
/// questions come back.
async fn generate_questions(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Json(payload): Json<GenerateQuestionsRequest>,
) -> Result<Response, AppError> {
    let services = state.services();

    let topic = match payload.topic_id {
        Some(id) => Some(services.topics().get(id).await?),
        None => None,
    };
    let subject = payload
        .subject
        .or_else(|| topic.as_ref().map(|topic| topic.subject))
        .ok_or_else(|| AppError::validation("choose a subject or a topic"))?;

    let seed = match (payload.seed, &topic) {
        (Some(draft), _) => Some(
            draft
                .into_question(QuestionSource::Seed)
                .map_err(|err| AppError::validation(err.to_string()))?,
        ),
        (None, Some(topic)) => services
            .topics()
            .seeds_for(&[topic.id])
            .await?
            .into_iter()
            .next()
            .map(|seed| seed.question),
        (None, None) => None,
    };

    let quota = services.quota();
    quota.consume(&user_id, subject).await?;

    let mut request = GenerationRequest::new(subject)
        .with_topic(topic)
        .with_seed(seed);
    if let Some(count) = payload.count {
        request = request.with_count(count);
    }

    let questions = match services.generator().generate(&request).await {
        Ok(questions) => questions,
        Err(err) => {
            if let Err(refund_err) = quota.refund(&user_id, subject).await {
                tracing::warn!(error = %refund_err, user_id = %user_id, "failed to refund quota unit");
            }
            return Err(err.into());
        }
    };

    Ok(ok(GenerateQuestionsResponse { questions }).into_response())
}
