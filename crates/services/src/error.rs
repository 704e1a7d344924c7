//! Shared error types for the services crate.

use std::time::Duration;

use thiserror::Error;

use quiz_core::model::{QuestionError, QuotaError, SessionStatsError, TopicError, TopicId};
use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;

use crate::sessions::SessionPhase;

/// Errors emitted by the generation client and question generators.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum GenerationError {
    #[error("question generation is not configured")]
    Disabled,
    #[error("invalid generation config: {0}")]
    InvalidConfig(String),
    #[error("generation provider returned {status}: {message}")]
    HttpStatus { status: u16, message: String },
    #[error("generation provider quota exceeded, retry in {}s", retry_after.as_secs())]
    RateLimited { retry_after: Duration },
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error("generation provider returned an empty response")]
    EmptyResponse,
    #[error("could not parse generated questions: {reason}")]
    Parse { raw: String, reason: String },
}

/// Errors emitted by `QuotaService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum QuotaServiceError {
    #[error(transparent)]
    Quota(#[from] QuotaError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl QuotaServiceError {
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        matches!(self, Self::Quota(QuotaError::Exhausted { .. }))
    }
}

/// Errors emitted by `TopicService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TopicServiceError {
    #[error("topic {0} not found")]
    NotFound(TopicId),
    #[error(transparent)]
    Topic(#[from] TopicError),
    #[error(transparent)]
    Question(#[from] QuestionError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by the practice session services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SessionError {
    #[error("session not found")]
    NotFound,
    #[error("session already completed")]
    Completed,
    #[error("cannot {action} while the session is {phase}")]
    InvalidPhase {
        action: &'static str,
        phase: SessionPhase,
    },
    #[error("topic {0} not found")]
    TopicNotFound(TopicId),
    #[error("choose a subject or at least one topic")]
    NoSubject,
    #[error("question count must be between 1 and {max}, got {got}")]
    InvalidCount { got: u32, max: u32 },
    #[error(transparent)]
    Stats(#[from] SessionStatsError),
    #[error(transparent)]
    Quota(#[from] QuotaServiceError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by the billing webhook.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum BillingError {
    #[error("billing webhook secret is not configured")]
    NotConfigured,
    #[error("missing signature header")]
    MissingSignature,
    #[error("malformed signature header")]
    MalformedSignature,
    #[error("signature does not match payload")]
    SignatureMismatch,
    #[error("signature timestamp is {age_secs}s away from now")]
    StaleTimestamp { age_secs: i64 },
    #[error("invalid webhook payload: {0}")]
    Payload(#[from] serde_json::Error),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Quota(#[from] QuotaError),
}
