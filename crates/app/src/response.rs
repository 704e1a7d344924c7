use axum::Json;
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use services::{
    BillingError, GenerationError, QuotaServiceError, SessionError, TopicServiceError,
};
use storage::repository::StorageError;

//
// ─── SUCCESS ───────────────────────────────────────────────────────────────────
//

#[derive(Debug, Serialize)]
pub struct ApiSuccess<T> {
    pub success: bool,
    pub result: T,
}

/// Wrap a handler result as `{"success": true, "result": ...}`.
pub fn ok<T: Serialize>(result: T) -> Json<ApiSuccess<T>> {
    Json(ApiSuccess {
        success: true,
        result,
    })
}

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AppError {
    status: StatusCode,
    code: String,
    message: String,
    is_operational: bool,
    retry_after: Option<u64>,
    raw: Option<String>,
}

impl AppError {
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::operational(StatusCode::NOT_FOUND, "NOT_FOUND", message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::operational(StatusCode::UNAUTHORIZED, "UNAUTHORIZED", message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::operational(StatusCode::CONFLICT, "CONFLICT", message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::operational(StatusCode::BAD_REQUEST, "BAD_REQUEST", message)
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::operational(StatusCode::BAD_REQUEST, "VALIDATION_ERROR", message)
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::operational(StatusCode::SERVICE_UNAVAILABLE, "NOT_CONFIGURED", message)
    }

    pub fn upstream(message: impl Into<String>) -> Self {
        Self::operational(StatusCode::BAD_GATEWAY, "UPSTREAM_ERROR", message)
    }

    pub fn rate_limited(message: impl Into<String>, retry_after_secs: Option<u64>) -> Self {
        let mut err = Self::operational(StatusCode::TOO_MANY_REQUESTS, "RATE_LIMITED", message);
        err.retry_after = retry_after_secs;
        err
    }

    pub fn quota_exhausted(message: impl Into<String>) -> Self {
        Self::operational(StatusCode::TOO_MANY_REQUESTS, "QUOTA_EXHAUSTED", message)
    }

    /// Model output that could not be turned into questions. The raw text is
    /// returned so the caller can show or log it.
    pub fn parse(message: impl Into<String>, raw: impl Into<String>) -> Self {
        let mut err = Self::operational(StatusCode::UNPROCESSABLE_ENTITY, "PARSE_ERROR", message);
        err.raw = Some(raw.into());
        err
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            code: "INTERNAL_ERROR".to_string(),
            message: message.into(),
            is_operational: false,
            retry_after: None,
            raw: None,
        }
    }

    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    fn operational(
        status: StatusCode,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            status,
            code: code.into(),
            message: message.into(),
            is_operational: true,
            retry_after: None,
            raw: None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let message = if self.is_operational {
            self.message
        } else {
            tracing::error!(error = %self.message, "internal error");
            "internal server error".to_string()
        };

        let body = ErrorResponse {
            success: false,
            error: message,
            code: self.code,
            raw: self.raw,
        };

        let mut response = (self.status, Json(body)).into_response();
        if let Some(secs) = self.retry_after {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(secs));
        }
        response
    }
}

//
// ─── CONVERSIONS ───────────────────────────────────────────────────────────────
//

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound => Self::not_found("resource not found"),
            StorageError::Conflict => Self::conflict("resource already exists"),
            other => Self::internal(other.to_string()),
        }
    }
}

impl From<GenerationError> for AppError {
    fn from(err: GenerationError) -> Self {
        match err {
            GenerationError::Disabled | GenerationError::InvalidConfig(_) => {
                Self::unavailable(err.to_string())
            }
            GenerationError::RateLimited { retry_after } => {
                Self::rate_limited(err.to_string(), Some(retry_after.as_secs()))
            }
            GenerationError::HttpStatus { message, .. } => Self::upstream(message),
            GenerationError::Parse { raw, reason } => Self::parse(reason, raw),
            other => Self::upstream(other.to_string()),
        }
    }
}

impl From<QuotaServiceError> for AppError {
    fn from(err: QuotaServiceError) -> Self {
        if err.is_exhausted() {
            return Self::quota_exhausted(err.to_string());
        }
        match err {
            QuotaServiceError::Storage(storage) => storage.into(),
            other => Self::internal(other.to_string()),
        }
    }
}

impl From<TopicServiceError> for AppError {
    fn from(err: TopicServiceError) -> Self {
        match err {
            TopicServiceError::NotFound(_) => Self::not_found(err.to_string()),
            TopicServiceError::Topic(_) | TopicServiceError::Question(_) => {
                Self::validation(err.to_string())
            }
            TopicServiceError::Storage(storage) => storage.into(),
            other => Self::internal(other.to_string()),
        }
    }
}

impl From<SessionError> for AppError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::NotFound | SessionError::TopicNotFound(_) => {
                Self::not_found(err.to_string())
            }
            SessionError::Completed | SessionError::InvalidPhase { .. } => {
                Self::conflict(err.to_string())
            }
            SessionError::NoSubject | SessionError::InvalidCount { .. } => {
                Self::validation(err.to_string())
            }
            SessionError::Quota(quota) => quota.into(),
            SessionError::Storage(storage) => storage.into(),
            other => Self::internal(other.to_string()),
        }
    }
}

impl From<BillingError> for AppError {
    fn from(err: BillingError) -> Self {
        match err {
            BillingError::NotConfigured => Self::unavailable(err.to_string()),
            BillingError::MissingSignature
            | BillingError::MalformedSignature
            | BillingError::Payload(_) => Self::bad_request(err.to_string()),
            BillingError::SignatureMismatch | BillingError::StaleTimestamp { .. } => {
                Self::unauthorized(err.to_string())
            }
            BillingError::Storage(storage) => storage.into(),
            other => Self::internal(other.to_string()),
        }
    }
}
