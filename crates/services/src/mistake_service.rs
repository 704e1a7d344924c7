use std::sync::Arc;

use quiz_core::model::{MistakeId, MistakeRecord, NewMistake, UserId};
use storage::repository::{MistakeRepository, StorageError};

/// Mistakes returned when the caller gives no limit.
pub const DEFAULT_MISTAKE_PAGE: u32 = 50;
const MAX_MISTAKE_PAGE: u32 = 200;

/// The per-user mistake book.
#[derive(Clone)]
pub struct MistakeService {
    mistakes: Arc<dyn MistakeRepository>,
}

impl MistakeService {
    #[must_use]
    pub fn new(mistakes: Arc<dyn MistakeRepository>) -> Self {
        Self { mistakes }
    }

    /// Most recent mistakes first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on repository failures.
    pub async fn recent(
        &self,
        user_id: &UserId,
        limit: Option<u32>,
    ) -> Result<Vec<MistakeRecord>, StorageError> {
        let limit = limit.unwrap_or(DEFAULT_MISTAKE_PAGE).clamp(1, MAX_MISTAKE_PAGE);
        self.mistakes.list_mistakes(user_id, limit).await
    }

    /// # Errors
    ///
    /// Returns `StorageError` on repository failures.
    pub async fn count(&self, user_id: &UserId) -> Result<u32, StorageError> {
        self.mistakes.count_mistakes(user_id).await
    }

    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the user owns no such mistake.
    pub async fn delete(&self, user_id: &UserId, id: MistakeId) -> Result<(), StorageError> {
        self.mistakes.delete_mistake(user_id, id).await
    }

    /// Persist a wrong answer on a background task. Failures are only logged.
    pub fn record_in_background(&self, mistake: NewMistake) -> tokio::task::JoinHandle<()> {
        let mistakes = Arc::clone(&self.mistakes);
        tokio::spawn(async move {
            let user_id = mistake.user_id.clone();
            if let Err(err) = mistakes.append_mistake(mistake).await {
                tracing::warn!(error = %err, user_id = %user_id, "failed to persist mistake");
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quiz_core::model::{Question, QuestionSource, Subject};
    use quiz_core::time::fixed_now;
    use storage::repository::InMemoryRepository;

    fn mistake(user: &str, wrong: &str) -> NewMistake {
        NewMistake {
            user_id: UserId::new(user).unwrap(),
            subject: Subject::Math,
            topic_id: None,
            question: Question::new("9 - 4 = ?", Some("5".into()), None, QuestionSource::Generated)
                .unwrap(),
            wrong_answer: wrong.into(),
            recorded_at: fixed_now(),
        }
    }

    #[tokio::test]
    async fn background_record_then_list_and_delete() {
        let service = MistakeService::new(Arc::new(InMemoryRepository::new()));
        let user = UserId::new("kid").unwrap();

        service.record_in_background(mistake("kid", "4")).await.unwrap();
        service.record_in_background(mistake("kid", "6")).await.unwrap();

        let listed = service.recent(&user, None).await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].wrong_answer, "6");
        assert_eq!(service.recent(&user, Some(0)).await.unwrap().len(), 1);

        service.delete(&user, listed[0].id).await.unwrap();
        assert_eq!(service.count(&user).await.unwrap(), 1);
    }
}
