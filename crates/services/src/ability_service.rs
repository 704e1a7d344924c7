use std::sync::Arc;

use quiz_core::model::{
    AbilityScore, GradedAnswer, Subject, SubjectDelta, UserId, ability_delta,
};
use storage::repository::{AbilityRepository, StorageError};

use crate::Clock;

/// Reads and updates per-subject ability scores.
#[derive(Clone)]
pub struct AbilityService {
    clock: Clock,
    abilities: Arc<dyn AbilityRepository>,
}

impl AbilityService {
    #[must_use]
    pub fn new(clock: Clock, abilities: Arc<dyn AbilityRepository>) -> Self {
        Self { clock, abilities }
    }

    /// Scores for every subject; subjects never practiced report the default.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on repository failures.
    pub async fn list(&self, user_id: &UserId) -> Result<Vec<AbilityScore>, StorageError> {
        let stored = self.abilities.list_abilities(user_id).await?;
        let now = self.clock.now();
        Ok(Subject::ALL
            .into_iter()
            .map(|subject| {
                stored
                    .iter()
                    .find(|score| score.subject == subject)
                    .cloned()
                    .unwrap_or_else(|| AbilityScore::initial(user_id.clone(), subject, now))
            })
            .collect())
    }

    /// Fold a session's graded answers into the stored score.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the score cannot be read or written.
    pub async fn apply_session(
        &self,
        user_id: &UserId,
        subject: Subject,
        answers: &[GradedAnswer],
    ) -> Result<SubjectDelta, StorageError> {
        let now = self.clock.now();
        let mut score = self
            .abilities
            .get_ability(user_id, subject)
            .await?
            .unwrap_or_else(|| AbilityScore::initial(user_id.clone(), subject, now));

        let before = score.score();
        let delta = ability_delta(before, answers);
        let graded = u32::try_from(answers.len()).unwrap_or(u32::MAX);

        if graded > 0 {
            score.apply(delta, graded, now);
            self.abilities.upsert_ability(&score).await?;
        }

        Ok(SubjectDelta {
            subject,
            before,
            delta,
            graded,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quiz_core::model::DEFAULT_ABILITY;
    use quiz_core::time::fixed_now;
    use storage::repository::InMemoryRepository;

    fn user() -> UserId {
        UserId::new("kid").unwrap()
    }

    #[tokio::test]
    async fn list_fills_missing_subjects() {
        let service = AbilityService::new(
            Clock::fixed(fixed_now()),
            Arc::new(InMemoryRepository::new()),
        );
        let scores = service.list(&user()).await.unwrap();
        assert_eq!(scores.len(), 4);
        assert!(scores.iter().all(|s| s.score() == DEFAULT_ABILITY));
    }

    #[tokio::test]
    async fn session_delta_is_persisted() {
        let repo = InMemoryRepository::new();
        let service = AbilityService::new(Clock::fixed(fixed_now()), Arc::new(repo.clone()));
        let answers = [GradedAnswer { correct: true }, GradedAnswer { correct: true }];

        let delta = service
            .apply_session(&user(), Subject::Math, &answers)
            .await
            .unwrap();
        assert_eq!(delta.before, DEFAULT_ABILITY);
        assert!(delta.delta > 0.0);
        assert_eq!(delta.graded, 2);

        let stored = repo.get_ability(&user(), Subject::Math).await.unwrap().unwrap();
        assert!((stored.score() - (DEFAULT_ABILITY + delta.delta)).abs() < 1e-9);
    }

    #[tokio::test]
    async fn empty_session_writes_nothing() {
        let repo = InMemoryRepository::new();
        let service = AbilityService::new(Clock::fixed(fixed_now()), Arc::new(repo.clone()));
        let delta = service.apply_session(&user(), Subject::English, &[]).await.unwrap();
        assert_eq!(delta.delta, 0.0);
        assert!(repo.get_ability(&user(), Subject::English).await.unwrap().is_none());
    }
}
