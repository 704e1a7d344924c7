use std::sync::Arc;

use chrono::Duration;
use quiz_core::model::{
    AnswerVerdict, NewMistake, Question, SessionSummary, Subject, Topic, TopicId, UsageEvent,
    UsageKind, UserId,
};
use rand::seq::IndexedRandom;
use serde::Deserialize;
use storage::repository::{SeedQuestionRepository, TopicRepository};
use tokio::sync::OwnedMutexGuard;

use super::practice::{PracticeSession, SessionId, SessionPhase};
use super::progress::SessionSnapshot;
use super::registry::SessionRegistry;
use crate::Clock;
use crate::ability_service::AbilityService;
use crate::error::{GenerationError, SessionError};
use crate::generation::{GenerationRequest, QuestionGenerator};
use crate::mistake_service::MistakeService;
use crate::quota_service::QuotaService;
use crate::telemetry::UsageRecorder;

/// Questions per session when the caller does not say.
pub const DEFAULT_SESSION_LENGTH: u32 = 10;
/// Upper bound on questions per session.
pub const MAX_SESSION_LENGTH: u32 = 50;

const DEFAULT_RETRY_SECS: i64 = 60;

/// Parameters for a new practice session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct StartSession {
    #[serde(default)]
    pub topic_ids: Vec<TopicId>,
    #[serde(default)]
    pub count: Option<u32>,
    #[serde(default)]
    pub subject: Option<Subject>,
}

/// Drives practice sessions against storage, quota and the generator.
#[derive(Clone)]
pub struct PracticeLoopService {
    clock: Clock,
    topics: Arc<dyn TopicRepository>,
    seeds: Arc<dyn SeedQuestionRepository>,
    quota: Arc<QuotaService>,
    abilities: AbilityService,
    mistakes: MistakeService,
    generator: Arc<dyn QuestionGenerator>,
    usage: UsageRecorder,
    registry: Arc<SessionRegistry>,
}

impl PracticeLoopService {
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        clock: Clock,
        topics: Arc<dyn TopicRepository>,
        seeds: Arc<dyn SeedQuestionRepository>,
        quota: Arc<QuotaService>,
        abilities: AbilityService,
        mistakes: MistakeService,
        generator: Arc<dyn QuestionGenerator>,
        usage: UsageRecorder,
    ) -> Self {
        Self {
            clock,
            topics,
            seeds,
            quota,
            abilities,
            mistakes,
            generator,
            usage,
            registry: Arc::new(SessionRegistry::default()),
        }
    }

    #[must_use]
    pub fn with_registry(mut self, registry: Arc<SessionRegistry>) -> Self {
        self.registry = registry;
        self
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// Start a session and generate its first question.
    ///
    /// One unit of the daily quota is taken before anything else happens:
    /// an exhausted subject returns an error, creates no session and issues
    /// no generation request. The unit is refunded if the first question
    /// falls back to a placeholder.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::InvalidCount`, `TopicNotFound` or `NoSubject`
    /// for bad input, `SessionError::Quota` when today's budget is used up,
    /// and `SessionError::Storage` on repository failures.
    pub async fn start(
        &self,
        user_id: &UserId,
        request: StartSession,
    ) -> Result<SessionSnapshot, SessionError> {
        let count = request.count.unwrap_or(DEFAULT_SESSION_LENGTH);
        if count == 0 || count > MAX_SESSION_LENGTH {
            return Err(SessionError::InvalidCount {
                got: count,
                max: MAX_SESSION_LENGTH,
            });
        }

        let mut topic_ids = request.topic_ids;
        topic_ids.sort_unstable();
        topic_ids.dedup();
        let mut topics = Vec::with_capacity(topic_ids.len());
        for id in topic_ids {
            let topic = self
                .topics
                .get_topic(id)
                .await?
                .ok_or(SessionError::TopicNotFound(id))?;
            topics.push(topic);
        }

        let subject = request
            .subject
            .or_else(|| topics.first().map(|topic| topic.subject))
            .ok_or(SessionError::NoSubject)?;

        let now = self.clock.now();
        let session =
            PracticeSession::new(SessionId::new(), user_id.clone(), subject, topics, count, now)?;
        self.quota.consume(user_id, subject).await?;
        let id = session.id();
        let shared = self.registry.insert(session, now);
        let mut session = shared.lock_owned().await;

        tracing::info!(
            session_id = %id,
            user_id = %user_id,
            subject = %subject,
            total = count,
            "practice session started"
        );

        self.generate_next(&mut session).await;
        Ok(SessionSnapshot::from(&*session))
    }

    /// # Errors
    ///
    /// Returns `SessionError::NotFound` for unknown sessions or sessions
    /// owned by another user.
    pub async fn snapshot(
        &self,
        user_id: &UserId,
        id: SessionId,
    ) -> Result<SessionSnapshot, SessionError> {
        let session = self.lock_session(user_id, id).await?;
        Ok(SessionSnapshot::from(&*session))
    }

    /// Grade an answer for the current question.
    ///
    /// Usage logging and mistake persistence run in the background; their
    /// failures never reach the caller.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NotFound` for unknown sessions and
    /// `SessionError::InvalidPhase` when no question awaits an answer.
    pub async fn check_answer(
        &self,
        user_id: &UserId,
        id: SessionId,
        answer: &str,
    ) -> Result<SessionSnapshot, SessionError> {
        let mut session = self.lock_session(user_id, id).await?;
        let now = self.clock.now();
        let verdict = session.record_answer(answer, now)?;
        let topic_id = session.current_topic();

        self.usage.record(UsageEvent {
            user_id: user_id.clone(),
            subject: session.subject(),
            topic_id,
            kind: UsageKind::AnswerChecked,
            correct: match verdict {
                AnswerVerdict::Correct => Some(true),
                AnswerVerdict::Incorrect => Some(false),
                AnswerVerdict::Ungraded => None,
            },
            created_at: now,
        });

        if verdict.is_incorrect() {
            if let Some(question) = session.current_question() {
                self.mistakes.record_in_background(NewMistake {
                    user_id: user_id.clone(),
                    subject: session.subject(),
                    topic_id,
                    question: question.clone(),
                    wrong_answer: answer.trim().to_owned(),
                    recorded_at: now,
                });
            }
        }

        tracing::debug!(session_id = %id, verdict = ?verdict, "answer checked");
        Ok(SessionSnapshot::from(&*session))
    }

    /// Move to the next question, or to the summary after the last one.
    ///
    /// A placeholder question shown after a failed generation can be skipped
    /// this way without answering it; the same slot is generated again.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Completed` once the summary was produced
    /// (no generation is attempted), `SessionError::InvalidPhase` while a
    /// real question still awaits an answer, and `SessionError::Storage` if
    /// the ability update cannot be persisted.
    pub async fn next(
        &self,
        user_id: &UserId,
        id: SessionId,
    ) -> Result<SessionSnapshot, SessionError> {
        let mut session = self.lock_session(user_id, id).await?;
        match session.phase() {
            SessionPhase::Summary => return Err(SessionError::Completed),
            SessionPhase::AwaitingAnswer if !session.can_retry() => {
                return Err(SessionError::InvalidPhase {
                    action: "move to the next question",
                    phase: SessionPhase::AwaitingAnswer,
                });
            }
            SessionPhase::Idle
            | SessionPhase::AwaitingAnswer
            | SessionPhase::Answered
            | SessionPhase::Generating => {}
        }

        if !session.needs_question() {
            self.finish(&mut session, false).await?;
            return Ok(SessionSnapshot::from(&*session));
        }

        match self.quota.consume(user_id, session.subject()).await {
            Ok(_) => self.generate_next(&mut session).await,
            Err(err) if err.is_exhausted() => {
                tracing::info!(session_id = %id, "daily quota used up, ending session early");
                self.finish(&mut session, true).await?;
            }
            Err(err) => return Err(err.into()),
        }
        Ok(SessionSnapshot::from(&*session))
    }

    // ─── Internals ───────────────────────────────────────────────────────────

    async fn lock_session(
        &self,
        user_id: &UserId,
        id: SessionId,
    ) -> Result<OwnedMutexGuard<PracticeSession>, SessionError> {
        let shared = self.registry.get(id).ok_or(SessionError::NotFound)?;
        let mut session = shared.lock_owned().await;
        if session.user_id() != user_id {
            return Err(SessionError::NotFound);
        }
        if session.apply_pending_reset(self.clock.now()) {
            tracing::debug!(session_id = %id, "session reset after rate limit");
        }
        Ok(session)
    }

    /// Generate one question into the session against a quota unit the
    /// caller already took. Failures are replaced by a fallback question and
    /// the unit is refunded.
    async fn generate_next(&self, session: &mut PracticeSession) {
        let now = self.clock.now();
        let number = match session.begin_generation(now) {
            Ok(number) => number,
            Err(err) => {
                tracing::warn!(session_id = %session.id(), error = %err, "cannot generate");
                self.refund(session.user_id(), session.subject()).await;
                return;
            }
        };

        let request = self.build_request(session).await;
        let topic_id = request.topic.as_ref().map(|topic| topic.id);
        let result = self
            .generator
            .generate(&request)
            .await
            .and_then(|questions| questions.into_iter().next().ok_or(GenerationError::EmptyResponse));

        let user_id = session.user_id().clone();
        let subject = session.subject();
        let now = self.clock.now();
        match result {
            Ok(question) => {
                self.usage.record(UsageEvent {
                    user_id,
                    subject,
                    topic_id,
                    kind: UsageKind::QuestionGenerated,
                    correct: None,
                    created_at: now,
                });
                session.present(question, topic_id, now);
                tracing::debug!(session_id = %session.id(), number, "question generated");
            }
            Err(err) => {
                tracing::warn!(
                    session_id = %session.id(),
                    number,
                    error = %err,
                    "question generation failed, using fallback"
                );
                self.refund(&user_id, subject).await;
                self.usage.record(UsageEvent {
                    user_id,
                    subject,
                    topic_id,
                    kind: UsageKind::GenerationFailed,
                    correct: None,
                    created_at: now,
                });
                let message = fallback_message(&err);
                if let GenerationError::RateLimited { retry_after } = &err {
                    let delay = Duration::from_std(*retry_after)
                        .unwrap_or_else(|_| Duration::seconds(DEFAULT_RETRY_SECS));
                    session.schedule_reset(now + delay);
                }
                session.present(Question::fallback(message.clone()), topic_id, now);
                session.set_notice(message);
            }
        }
    }

    async fn refund(&self, user_id: &UserId, subject: Subject) {
        if let Err(err) = self.quota.refund(user_id, subject).await {
            tracing::warn!(user_id = %user_id, error = %err, "failed to refund quota unit");
        }
    }

    async fn build_request(&self, session: &PracticeSession) -> GenerationRequest {
        let topic_ids: Vec<TopicId> = session.topics().iter().map(|topic| topic.id).collect();
        let seeds = if topic_ids.is_empty() {
            Vec::new()
        } else {
            match self.seeds.seeds_for_topics(&topic_ids).await {
                Ok(seeds) => seeds,
                Err(err) => {
                    tracing::warn!(error = %err, "failed to load seed questions");
                    Vec::new()
                }
            }
        };

        let (topic, seed) = {
            let mut rng = rand::rng();
            match seeds.choose(&mut rng) {
                Some(seed) => (
                    find_topic(session.topics(), seed.topic_id),
                    Some(seed.question.clone()),
                ),
                None => (session.topics().choose(&mut rng).cloned(), None),
            }
        };

        GenerationRequest::new(session.subject())
            .with_topic(topic)
            .with_seed(seed)
            .with_count(1)
    }

    async fn finish(
        &self,
        session: &mut PracticeSession,
        ended_early: bool,
    ) -> Result<(), SessionError> {
        let ability = self
            .abilities
            .apply_session(session.user_id(), session.subject(), session.graded_answers())
            .await?;
        let summary = SessionSummary {
            subject: session.subject(),
            stats: *session.stats(),
            ungraded: session.ungraded(),
            mistakes: session.mistakes(),
            ability,
            started_at: session.started_at(),
            completed_at: self.clock.now(),
            ended_early,
        };
        let id = session.id();
        let summary = session.finish(summary)?;
        tracing::info!(
            session_id = %id,
            correct = summary.stats.correct(),
            answered = summary.stats.answered(),
            ability_delta = summary.ability.delta,
            ended_early,
            "practice session completed"
        );
        Ok(())
    }
}

fn find_topic(topics: &[Topic], id: TopicId) -> Option<Topic> {
    topics.iter().find(|topic| topic.id == id).cloned()
}

fn fallback_message(err: &GenerationError) -> String {
    match err {
        GenerationError::Disabled | GenerationError::InvalidConfig(_) => {
            "Question generation is not configured yet. Ask an administrator to set it up.".to_owned()
        }
        GenerationError::RateLimited { retry_after } => format!(
            "The question service is busy. Practice resumes in about {} seconds.",
            retry_after.as_secs()
        ),
        GenerationError::Parse { .. } | GenerationError::EmptyResponse => {
            "The generated question could not be read. Move on to try another one.".to_owned()
        }
        _ => "Question generation is unavailable right now. Please try again later.".to_owned(),
    }
}
