use std::sync::Arc;

use chrono::{DateTime, NaiveTime, TimeZone, Utc};
use quiz_core::model::{AbilityScore, DailyTask, Plan, Subscription, UsageKind, UserId};
use serde::Serialize;
use storage::repository::{SubscriptionRepository, UsageLogRepository};

use crate::Clock;
use crate::ability_service::AbilityService;
use crate::error::QuotaServiceError;
use crate::mistake_service::MistakeService;
use crate::quota_service::QuotaService;

/// One user's progress at a glance, shared by the child and parent views.
#[derive(Debug, Clone, Serialize)]
pub struct Dashboard {
    pub user_id: UserId,
    pub plan: Plan,
    pub premium: bool,
    pub subscription: Option<Subscription>,
    pub abilities: Vec<AbilityScore>,
    pub daily_tasks: Vec<DailyTask>,
    pub mistake_count: u32,
    pub answers_today: u32,
    pub generated_today: u32,
}

#[derive(Clone)]
pub struct DashboardService {
    clock: Clock,
    abilities: AbilityService,
    mistakes: MistakeService,
    quota: Arc<QuotaService>,
    usage: Arc<dyn UsageLogRepository>,
    subscriptions: Arc<dyn SubscriptionRepository>,
}

impl DashboardService {
    #[must_use]
    pub fn new(
        clock: Clock,
        abilities: AbilityService,
        mistakes: MistakeService,
        quota: Arc<QuotaService>,
        usage: Arc<dyn UsageLogRepository>,
        subscriptions: Arc<dyn SubscriptionRepository>,
    ) -> Self {
        Self {
            clock,
            abilities,
            mistakes,
            quota,
            usage,
            subscriptions,
        }
    }

    /// # Errors
    ///
    /// Returns `QuotaServiceError::Storage` on repository failures.
    pub async fn for_user(&self, user_id: &UserId) -> Result<Dashboard, QuotaServiceError> {
        let since = self.start_of_quota_day();
        let subscription = self.subscriptions.get_subscription(user_id).await?;

        Ok(Dashboard {
            user_id: user_id.clone(),
            plan: subscription.as_ref().map_or(Plan::Free, |s| s.plan),
            premium: subscription.as_ref().is_some_and(Subscription::grants_premium),
            subscription,
            abilities: self.abilities.list(user_id).await?,
            daily_tasks: self.quota.today(user_id).await?,
            mistake_count: self.mistakes.count(user_id).await?,
            answers_today: self
                .usage
                .count_since(user_id, UsageKind::AnswerChecked, since)
                .await?,
            generated_today: self
                .usage
                .count_since(user_id, UsageKind::QuestionGenerated, since)
                .await?,
        })
    }

    fn start_of_quota_day(&self) -> DateTime<Utc> {
        let now = self.clock.now();
        let policy = self.quota.policy();
        let midnight = policy.day_of(now).and_time(NaiveTime::MIN);
        policy
            .offset()
            .from_local_datetime(&midnight)
            .single()
            .map_or(now, |local| local.with_timezone(&Utc))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use quiz_core::model::{QuotaPolicy, Subject, UsageEvent};
    use quiz_core::time::fixed_now;
    use storage::repository::InMemoryRepository;

    #[tokio::test]
    async fn dashboard_counts_today_only() {
        let repo = InMemoryRepository::new();
        let clock = Clock::fixed(fixed_now());
        let quota = Arc::new(QuotaService::new(
            clock,
            QuotaPolicy::default(),
            Arc::new(repo.clone()),
            Arc::new(repo.clone()),
        ));
        let dashboard = DashboardService::new(
            clock,
            AbilityService::new(clock, Arc::new(repo.clone())),
            MistakeService::new(Arc::new(repo.clone())),
            Arc::clone(&quota),
            Arc::new(repo.clone()),
            Arc::new(repo.clone()),
        );
        let user = UserId::new("kid").unwrap();

        for at in [fixed_now() - Duration::days(1), fixed_now()] {
            repo.append_usage(&UsageEvent {
                user_id: user.clone(),
                subject: Subject::Math,
                topic_id: None,
                kind: UsageKind::AnswerChecked,
                correct: Some(true),
                created_at: at,
            })
            .await
            .unwrap();
        }
        quota.consume(&user, Subject::Math).await.unwrap();

        let view = dashboard.for_user(&user).await.unwrap();
        assert_eq!(view.answers_today, 1);
        assert_eq!(view.plan, Plan::Free);
        assert!(!view.premium);
        assert_eq!(view.abilities.len(), 4);
        let math = view
            .daily_tasks
            .iter()
            .find(|t| t.subject == Subject::Math)
            .unwrap();
        assert_eq!(math.used(), 1);
    }
}
