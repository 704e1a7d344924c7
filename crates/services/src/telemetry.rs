use std::sync::Arc;

use quiz_core::model::UsageEvent;
use storage::repository::UsageLogRepository;

/// Fire-and-forget writer for the usage log.
///
/// Each event is appended on its own task; failures are logged and never
/// reach the caller.
#[derive(Clone)]
pub struct UsageRecorder {
    usage: Arc<dyn UsageLogRepository>,
}

impl UsageRecorder {
    #[must_use]
    pub fn new(usage: Arc<dyn UsageLogRepository>) -> Self {
        Self { usage }
    }

    /// Spawn the append. Must be called from within a tokio runtime.
    pub fn record(&self, event: UsageEvent) -> tokio::task::JoinHandle<()> {
        let usage = Arc::clone(&self.usage);
        tokio::spawn(async move {
            if let Err(err) = usage.append_usage(&event).await {
                tracing::warn!(
                    error = %err,
                    kind = event.kind.as_str(),
                    user_id = %event.user_id,
                    "failed to record usage event"
                );
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use quiz_core::model::{Subject, UsageKind, UserId};
    use quiz_core::time::fixed_now;
    use storage::repository::{InMemoryRepository, StorageError};

    struct FailingUsage;

    #[async_trait]
    impl UsageLogRepository for FailingUsage {
        async fn append_usage(&self, _event: &UsageEvent) -> Result<i64, StorageError> {
            Err(StorageError::Connection("offline".into()))
        }

        async fn count_since(
            &self,
            _user_id: &UserId,
            _kind: UsageKind,
            _since: DateTime<Utc>,
        ) -> Result<u32, StorageError> {
            Ok(0)
        }
    }

    fn event() -> UsageEvent {
        UsageEvent {
            user_id: UserId::new("kid").unwrap(),
            subject: Subject::Math,
            topic_id: None,
            kind: UsageKind::AnswerChecked,
            correct: Some(true),
            created_at: fixed_now(),
        }
    }

    #[tokio::test]
    async fn records_in_background() {
        let repo = InMemoryRepository::new();
        let recorder = UsageRecorder::new(Arc::new(repo.clone()));
        recorder.record(event()).await.unwrap();

        let count = repo
            .count_since(&event().user_id, UsageKind::AnswerChecked, fixed_now())
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn failures_are_swallowed() {
        let recorder = UsageRecorder::new(Arc::new(FailingUsage));
        recorder.record(event()).await.unwrap();
    }
}
