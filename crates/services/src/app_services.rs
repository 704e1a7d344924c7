use std::env;
use std::sync::Arc;

use quiz_core::model::QuotaPolicy;
use storage::repository::Storage;

use crate::Clock;
use crate::ability_service::AbilityService;
use crate::billing::{BillingWebhookService, SignatureVerifier};
use crate::dashboard_service::DashboardService;
use crate::error::AppServicesError;
use crate::generation::{AiClient, AiConfig, AiQuestionGenerator, QuestionGenerator};
use crate::mistake_service::MistakeService;
use crate::quota_service::QuotaService;
use crate::sessions::PracticeLoopService;
use crate::telemetry::UsageRecorder;
use crate::topic_service::TopicService;

/// Settings read once at startup.
#[derive(Clone, Debug, Default)]
pub struct ServicesConfig {
    pub ai: Option<AiConfig>,
    pub quota: QuotaPolicy,
    pub billing_secret: Option<String>,
}

impl ServicesConfig {
    /// Read `QUIZ_*` variables.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError::Quota` for an out-of-range UTC offset.
    pub fn from_env() -> Result<Self, AppServicesError> {
        let offset = env_number("QUIZ_QUOTA_UTC_OFFSET_MINUTES").unwrap_or(0);
        let free = env_number("QUIZ_FREE_DAILY_LIMIT").unwrap_or(QuotaPolicy::DEFAULT_FREE_LIMIT);
        let premium = env_number("QUIZ_PREMIUM_DAILY_LIMIT")
            .unwrap_or(QuotaPolicy::DEFAULT_PREMIUM_LIMIT);

        Ok(Self {
            ai: AiConfig::from_env(),
            quota: QuotaPolicy::new(offset, free, premium)?,
            billing_secret: env::var("QUIZ_BILLING_WEBHOOK_SECRET")
                .ok()
                .filter(|s| !s.trim().is_empty()),
        })
    }
}

fn env_number<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

/// Assembles the services behind the HTTP layer.
#[derive(Clone)]
pub struct AppServices {
    ai_client: Arc<AiClient>,
    generator: Arc<dyn QuestionGenerator>,
    topics: Arc<TopicService>,
    mistakes: Arc<MistakeService>,
    abilities: Arc<AbilityService>,
    quota: Arc<QuotaService>,
    dashboard: Arc<DashboardService>,
    practice: Arc<PracticeLoopService>,
    billing: Arc<BillingWebhookService>,
}

impl AppServices {
    /// Build services backed by `SQLite` storage.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if storage initialization fails.
    pub async fn new_sqlite(
        db_url: &str,
        clock: Clock,
        config: ServicesConfig,
    ) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(db_url).await?;
        Ok(Self::from_storage(storage, clock, config))
    }

    /// Build services over in-memory repositories.
    #[must_use]
    pub fn in_memory(clock: Clock, config: ServicesConfig) -> Self {
        Self::from_storage(Storage::in_memory(), clock, config)
    }

    #[must_use]
    pub fn from_storage(storage: Storage, clock: Clock, config: ServicesConfig) -> Self {
        let ai_client = Arc::new(AiClient::new(config.ai.clone()));
        let generator: Arc<dyn QuestionGenerator> =
            Arc::new(AiQuestionGenerator::new(Arc::clone(&ai_client)));
        Self::assemble(storage, clock, config, ai_client, generator)
    }

    /// Like [`AppServices::from_storage`] with a caller-supplied generator.
    #[must_use]
    pub fn with_generator(
        storage: Storage,
        clock: Clock,
        config: ServicesConfig,
        generator: Arc<dyn QuestionGenerator>,
    ) -> Self {
        let ai_client = Arc::new(AiClient::new(config.ai.clone()));
        Self::assemble(storage, clock, config, ai_client, generator)
    }

    fn assemble(
        storage: Storage,
        clock: Clock,
        config: ServicesConfig,
        ai_client: Arc<AiClient>,
        generator: Arc<dyn QuestionGenerator>,
    ) -> Self {
        let topics = TopicService::new(clock, Arc::clone(&storage.topics), Arc::clone(&storage.seeds));
        let mistakes = MistakeService::new(Arc::clone(&storage.mistakes));
        let abilities = AbilityService::new(clock, Arc::clone(&storage.abilities));
        let quota = Arc::new(QuotaService::new(
            clock,
            config.quota,
            Arc::clone(&storage.daily_tasks),
            Arc::clone(&storage.subscriptions),
        ));
        let dashboard = DashboardService::new(
            clock,
            abilities.clone(),
            mistakes.clone(),
            Arc::clone(&quota),
            Arc::clone(&storage.usage),
            Arc::clone(&storage.subscriptions),
        );
        let practice = PracticeLoopService::new(
            clock,
            Arc::clone(&storage.topics),
            Arc::clone(&storage.seeds),
            Arc::clone(&quota),
            abilities.clone(),
            mistakes.clone(),
            Arc::clone(&generator),
            UsageRecorder::new(Arc::clone(&storage.usage)),
        );
        let billing = BillingWebhookService::new(
            config.billing_secret.and_then(SignatureVerifier::new),
            Arc::clone(&storage.subscriptions),
            clock,
        );

        Self {
            ai_client,
            generator,
            topics: Arc::new(topics),
            mistakes: Arc::new(mistakes),
            abilities: Arc::new(abilities),
            quota,
            dashboard: Arc::new(dashboard),
            practice: Arc::new(practice),
            billing: Arc::new(billing),
        }
    }

    #[must_use]
    pub fn ai_client(&self) -> Arc<AiClient> {
        Arc::clone(&self.ai_client)
    }

    #[must_use]
    pub fn generator(&self) -> Arc<dyn QuestionGenerator> {
        Arc::clone(&self.generator)
    }

    #[must_use]
    pub fn topics(&self) -> Arc<TopicService> {
        Arc::clone(&self.topics)
    }

    #[must_use]
    pub fn mistakes(&self) -> Arc<MistakeService> {
        Arc::clone(&self.mistakes)
    }

    #[must_use]
    pub fn abilities(&self) -> Arc<AbilityService> {
        Arc::clone(&self.abilities)
    }

    #[must_use]
    pub fn quota(&self) -> Arc<QuotaService> {
        Arc::clone(&self.quota)
    }

    #[must_use]
    pub fn dashboard(&self) -> Arc<DashboardService> {
        Arc::clone(&self.dashboard)
    }

    #[must_use]
    pub fn practice(&self) -> Arc<PracticeLoopService> {
        Arc::clone(&self.practice)
    }

    #[must_use]
    pub fn billing(&self) -> Arc<BillingWebhookService> {
        Arc::clone(&self.billing)
    }
}
