use std::sync::Arc;

use quiz_core::model::{DailyTask, QuotaPolicy, Subject, UserId};
use storage::repository::{DailyTaskRepository, SubscriptionRepository};
use tokio::sync::Mutex;

use crate::Clock;
use crate::error::QuotaServiceError;

/// Per-user, per-subject daily question budget.
///
/// Reads roll stored tasks forward to the current quota day and refresh the
/// limit from the user's plan. Writes go through [`QuotaService::consume`]
/// and [`QuotaService::refund`], serialized by one lock so that checking and
/// counting a unit is a single step.
pub struct QuotaService {
    clock: Clock,
    policy: QuotaPolicy,
    tasks: Arc<dyn DailyTaskRepository>,
    subscriptions: Arc<dyn SubscriptionRepository>,
    write_lock: Mutex<()>,
}

impl QuotaService {
    #[must_use]
    pub fn new(
        clock: Clock,
        policy: QuotaPolicy,
        tasks: Arc<dyn DailyTaskRepository>,
        subscriptions: Arc<dyn SubscriptionRepository>,
    ) -> Self {
        Self {
            clock,
            policy,
            tasks,
            subscriptions,
            write_lock: Mutex::new(()),
        }
    }

    #[must_use]
    pub fn policy(&self) -> &QuotaPolicy {
        &self.policy
    }

    /// Today's task for one subject, without persisting anything.
    ///
    /// # Errors
    ///
    /// Returns `QuotaServiceError::Storage` on repository failures.
    pub async fn current(
        &self,
        user_id: &UserId,
        subject: Subject,
    ) -> Result<DailyTask, QuotaServiceError> {
        let now = self.clock.now();
        let today = self.policy.day_of(now);
        let subscription = self.subscriptions.get_subscription(user_id).await?;
        let limit = self.policy.limit_for(subscription.as_ref());

        let task = match self.tasks.get_task(user_id, subject).await? {
            Some(stored) => stored.rolled_to(today, limit),
            None => DailyTask::fresh(user_id.clone(), subject, today, limit),
        };
        Ok(task)
    }

    /// Fail fast when the subject's budget for today is used up.
    ///
    /// # Errors
    ///
    /// Returns `QuotaServiceError::Quota` with `QuotaError::Exhausted` once
    /// `used >= limit`; nothing is written either way.
    pub async fn ensure_available(
        &self,
        user_id: &UserId,
        subject: Subject,
    ) -> Result<DailyTask, QuotaServiceError> {
        let task = self.current(user_id, subject).await?;
        task.ensure_available()?;
        Ok(task)
    }

    /// Count one generated question and persist the task.
    ///
    /// # Errors
    ///
    /// Returns `QuotaServiceError::Quota` without writing if the budget is
    /// already used up, or `QuotaServiceError::Storage` on repository failures.
    pub async fn consume(
        &self,
        user_id: &UserId,
        subject: Subject,
    ) -> Result<DailyTask, QuotaServiceError> {
        let _guard = self.write_lock.lock().await;
        let mut task = self.current(user_id, subject).await?;
        task.record_use()?;
        self.tasks.save_task(&task).await?;
        tracing::debug!(
            user_id = %user_id,
            subject = %subject,
            used = task.used(),
            limit = task.limit(),
            "daily quota consumed"
        );
        Ok(task)
    }

    /// Return a unit taken by [`QuotaService::consume`] whose question was
    /// never delivered. A unit taken on an earlier quota day is not returned.
    ///
    /// # Errors
    ///
    /// Returns `QuotaServiceError::Storage` on repository failures.
    pub async fn refund(
        &self,
        user_id: &UserId,
        subject: Subject,
    ) -> Result<DailyTask, QuotaServiceError> {
        let _guard = self.write_lock.lock().await;
        let mut task = self.current(user_id, subject).await?;
        if task.used() == 0 {
            return Ok(task);
        }
        task.release_use();
        self.tasks.save_task(&task).await?;
        tracing::debug!(
            user_id = %user_id,
            subject = %subject,
            used = task.used(),
            "daily quota unit refunded"
        );
        Ok(task)
    }

    /// Today's tasks for every subject.
    ///
    /// # Errors
    ///
    /// Returns `QuotaServiceError::Storage` on repository failures.
    pub async fn today(&self, user_id: &UserId) -> Result<Vec<DailyTask>, QuotaServiceError> {
        let mut tasks = Vec::with_capacity(Subject::ALL.len());
        for subject in Subject::ALL {
            tasks.push(self.current(user_id, subject).await?);
        }
        Ok(tasks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use quiz_core::model::{Plan, QuotaError, Subscription};
    use quiz_core::time::fixed_now;
    use storage::repository::InMemoryRepository;

    fn service(repo: &InMemoryRepository, clock: Clock, policy: QuotaPolicy) -> QuotaService {
        QuotaService::new(clock, policy, Arc::new(repo.clone()), Arc::new(repo.clone()))
    }

    fn user() -> UserId {
        UserId::new("kid-1").unwrap()
    }

    #[tokio::test]
    async fn consume_stops_at_limit_without_writing() {
        let repo = InMemoryRepository::new();
        let quota = service(&repo, Clock::fixed(fixed_now()), QuotaPolicy::new(0, 2, 5).unwrap());

        quota.consume(&user(), Subject::Math).await.unwrap();
        quota.consume(&user(), Subject::Math).await.unwrap();
        let err = quota.consume(&user(), Subject::Math).await.unwrap_err();
        assert!(err.is_exhausted());

        let stored = repo.get_task(&user(), Subject::Math).await.unwrap().unwrap();
        assert_eq!(stored.used(), 2);
        assert!(matches!(
            quota.ensure_available(&user(), Subject::Math).await,
            Err(QuotaServiceError::Quota(QuotaError::Exhausted { used: 2, limit: 2, .. }))
        ));
        // Other subjects keep their own budget.
        quota.ensure_available(&user(), Subject::English).await.unwrap();
    }

    #[tokio::test]
    async fn concurrent_consumers_never_overdraw() {
        let repo = InMemoryRepository::new();
        let quota = Arc::new(service(
            &repo,
            Clock::fixed(fixed_now()),
            QuotaPolicy::new(0, 1, 5).unwrap(),
        ));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let quota = Arc::clone(&quota);
                tokio::spawn(async move { quota.consume(&user(), Subject::Math).await })
            })
            .collect();
        let mut granted = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                granted += 1;
            }
        }
        assert_eq!(granted, 1);
        let stored = repo.get_task(&user(), Subject::Math).await.unwrap().unwrap();
        assert_eq!(stored.used(), 1);
    }

    #[tokio::test]
    async fn refund_returns_unit_for_reuse() {
        let repo = InMemoryRepository::new();
        let quota = service(&repo, Clock::fixed(fixed_now()), QuotaPolicy::new(0, 1, 5).unwrap());

        // Nothing consumed yet: nothing to give back.
        assert_eq!(quota.refund(&user(), Subject::Math).await.unwrap().used(), 0);

        quota.consume(&user(), Subject::Math).await.unwrap();
        assert!(quota.consume(&user(), Subject::Math).await.unwrap_err().is_exhausted());
        assert_eq!(quota.refund(&user(), Subject::Math).await.unwrap().used(), 0);
        quota.consume(&user(), Subject::Math).await.unwrap();
    }

    #[tokio::test]
    async fn quota_rolls_over_at_configured_boundary() {
        let repo = InMemoryRepository::new();
        // UTC+8: fixed_now (22:13 UTC) is already 06:13 the next local day.
        let policy = QuotaPolicy::new(8 * 60, 1, 5).unwrap();
        let before_midnight = fixed_now() - Duration::hours(8);

        let quota = service(&repo, Clock::fixed(before_midnight), policy);
        quota.consume(&user(), Subject::Math).await.unwrap();
        assert!(quota.ensure_available(&user(), Subject::Math).await.is_err());

        let next_day = service(&repo, Clock::fixed(fixed_now()), policy);
        let task = next_day.ensure_available(&user(), Subject::Math).await.unwrap();
        assert_eq!(task.used(), 0);
    }

    #[tokio::test]
    async fn premium_plan_raises_limit() {
        let repo = InMemoryRepository::new();
        let quota = service(&repo, Clock::fixed(fixed_now()), QuotaPolicy::new(0, 1, 3).unwrap());
        quota.consume(&user(), Subject::Science).await.unwrap();
        assert!(quota.ensure_available(&user(), Subject::Science).await.is_err());

        let mut sub = Subscription::free(user(), fixed_now());
        sub.plan = Plan::Premium;
        repo.upsert_subscription(&sub).await.unwrap();

        let task = quota.ensure_available(&user(), Subject::Science).await.unwrap();
        assert_eq!(task.limit(), 3);
        assert_eq!(task.remaining(), 2);
    }

    #[tokio::test]
    async fn today_lists_every_subject() {
        let repo = InMemoryRepository::new();
        let quota = service(&repo, Clock::fixed(fixed_now()), QuotaPolicy::default());
        let tasks = quota.today(&user()).await.unwrap();
        assert_eq!(tasks.len(), Subject::ALL.len());
        assert!(tasks.iter().all(|t| t.used() == 0 && t.limit() == 10));
    }
}
