#![forbid(unsafe_code)]

pub mod ability_service;
pub mod app_services;
pub mod billing;
pub mod dashboard_service;
pub mod error;
pub mod generation;
pub mod mistake_service;
pub mod pacing;
pub mod quota_service;
pub mod sessions;
pub mod telemetry;
pub mod topic_service;

pub use quiz_core::Clock;

pub use ability_service::AbilityService;
pub use app_services::{AppServices, ServicesConfig};
pub use billing::{BillingWebhookService, SignatureVerifier, WebhookOutcome};
pub use dashboard_service::{Dashboard, DashboardService};
pub use error::{
    AppServicesError, BillingError, GenerationError, QuotaServiceError, SessionError,
    TopicServiceError,
};
pub use generation::{
    AiClient, AiConfig, AiQuestionGenerator, GenerationRequest, ImageAttachment,
    QuestionGenerator,
};
pub use mistake_service::MistakeService;
pub use pacing::RequestPacer;
pub use quota_service::QuotaService;
pub use sessions::{
    PracticeLoopService, PracticeSession, SessionId, SessionPhase, SessionRegistry,
    SessionSnapshot, StartSession,
};
pub use telemetry::UsageRecorder;
pub use topic_service::{SeedQuestionDraft, TopicService};
