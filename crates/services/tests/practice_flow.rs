use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use quiz_core::model::{
    AnswerVerdict, Question, QuestionSource, QuotaPolicy, Subject, TopicDraft, UserId,
};
use quiz_core::time::fixed_now;
use services::{
    AppServices, Clock, GenerationError, GenerationRequest, QuestionGenerator, SeedQuestionDraft,
    ServicesConfig, SessionError, SessionPhase, StartSession,
};
use storage::repository::{MistakeRepository, Storage};

/// Generator that replays scripted results and counts calls.
#[derive(Default)]
struct ScriptedGenerator {
    script: Mutex<VecDeque<Result<Vec<Question>, GenerationError>>>,
    requests: Mutex<Vec<GenerationRequest>>,
    calls: AtomicUsize,
}

impl ScriptedGenerator {
    fn push_question(&self, text: &str, answer: &str) {
        let question =
            Question::new(text, Some(answer.into()), None, QuestionSource::Generated).unwrap();
        self.script.lock().unwrap().push_back(Ok(vec![question]));
    }

    fn push_error(&self, err: GenerationError) {
        self.script.lock().unwrap().push_back(Err(err));
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl QuestionGenerator for ScriptedGenerator {
    async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<Vec<Question>, GenerationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());
        // Give concurrent callers a chance to interleave.
        tokio::task::yield_now().await;
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(GenerationError::EmptyResponse))
    }
}

fn setup(clock: Clock, free_limit: u32) -> (AppServices, Storage, Arc<ScriptedGenerator>) {
    let storage = Storage::in_memory();
    let generator = Arc::new(ScriptedGenerator::default());
    let config = ServicesConfig {
        quota: QuotaPolicy::new(0, free_limit, 50).unwrap(),
        ..ServicesConfig::default()
    };
    let services = AppServices::with_generator(
        storage.clone(),
        clock,
        config,
        Arc::clone(&generator) as Arc<dyn QuestionGenerator>,
    );
    (services, storage, generator)
}

fn kid() -> UserId {
    UserId::new("kid-1").unwrap()
}

fn math_only(count: u32) -> StartSession {
    StartSession {
        topic_ids: Vec::new(),
        count: Some(count),
        subject: Some(Subject::Math),
    }
}

async fn settle() {
    // Let spawned best-effort writes finish.
    tokio::time::sleep(Duration::from_millis(20)).await;
}

#[tokio::test]
async fn full_session_reaches_summary_exactly_once() {
    let (services, storage, generator) = setup(Clock::fixed(fixed_now()), 10);
    generator.push_question("2 + 2 = ?", "4");
    generator.push_question("10 / 4 = ?", "2.5");

    let practice = services.practice();
    let started = practice.start(&kid(), math_only(2)).await.unwrap();
    assert_eq!(started.phase, SessionPhase::AwaitingAnswer);
    assert_eq!(started.current, 1);
    assert_eq!(started.question.as_ref().unwrap().text, "2 + 2 = ?");

    let answered = practice.check_answer(&kid(), started.id, "5").await.unwrap();
    assert_eq!(answered.feedback.as_ref().unwrap().verdict, AnswerVerdict::Incorrect);
    assert_eq!(answered.mistakes, 1);

    let second = practice.next(&kid(), started.id).await.unwrap();
    assert_eq!(second.current, 2);
    let answered = practice.check_answer(&kid(), started.id, "2.55").await.unwrap();
    assert_eq!(answered.feedback.as_ref().unwrap().verdict, AnswerVerdict::Correct);

    let done = practice.next(&kid(), started.id).await.unwrap();
    assert_eq!(done.phase, SessionPhase::Summary);
    let summary = done.summary.unwrap();
    assert_eq!(summary.stats.correct(), 1);
    assert_eq!(summary.mistakes, 1);
    assert_eq!(summary.ability.graded, 2);
    assert!(!summary.ended_early);
    assert_eq!(generator.calls(), 2);

    assert!(matches!(
        practice.next(&kid(), started.id).await,
        Err(SessionError::Completed)
    ));
    assert_eq!(generator.calls(), 2);

    settle().await;
    let mistakes = storage.mistakes.list_mistakes(&kid(), 10).await.unwrap();
    assert_eq!(mistakes.len(), 1);
    assert_eq!(mistakes[0].wrong_answer, "5");

    let tasks = services.quota().today(&kid()).await.unwrap();
    let math = tasks.iter().find(|t| t.subject == Subject::Math).unwrap();
    assert_eq!(math.used(), 2);
}

#[tokio::test]
async fn exhausted_quota_blocks_start_without_generation() {
    let (services, _storage, generator) = setup(Clock::fixed(fixed_now()), 1);
    generator.push_question("1 + 1 = ?", "2");

    let practice = services.practice();
    let first = practice.start(&kid(), math_only(3)).await.unwrap();
    assert_eq!(generator.calls(), 1);

    let err = practice.start(&kid(), math_only(3)).await.unwrap_err();
    assert!(matches!(err, SessionError::Quota(ref q) if q.is_exhausted()));
    assert_eq!(generator.calls(), 1);

    let task = services.quota().current(&kid(), Subject::Math).await.unwrap();
    assert_eq!(task.used(), 1);

    // The running session ends early instead of generating past the limit.
    practice.check_answer(&kid(), first.id, "2").await.unwrap();
    let ended = practice.next(&kid(), first.id).await.unwrap();
    assert_eq!(ended.phase, SessionPhase::Summary);
    assert!(ended.summary.unwrap().ended_early);
    assert_eq!(generator.calls(), 1);
}

#[tokio::test]
async fn generation_failure_shows_fallback_and_keeps_quota() {
    let (services, _storage, generator) = setup(Clock::fixed(fixed_now()), 5);
    generator.push_error(GenerationError::Disabled);

    let practice = services.practice();
    let started = practice.start(&kid(), math_only(1)).await.unwrap();
    let question = started.question.unwrap();
    assert_eq!(question.source, QuestionSource::Fallback);
    assert!(!question.gradable);
    assert!(started.notice.is_some());

    let answered = practice.check_answer(&kid(), started.id, "whatever").await.unwrap();
    assert_eq!(answered.feedback.unwrap().verdict, AnswerVerdict::Ungraded);
    assert_eq!(answered.ungraded, 1);

    let task = services.quota().current(&kid(), Subject::Math).await.unwrap();
    assert_eq!(task.used(), 0);
}

#[tokio::test]
async fn concurrent_starts_cannot_overdraw_quota() {
    let (services, _storage, generator) = setup(Clock::fixed(fixed_now()), 1);
    generator.push_question("1 + 1 = ?", "2");
    generator.push_question("2 + 2 = ?", "4");

    let practice = services.practice();
    let user = kid();
    let (a, b) = tokio::join!(
        practice.start(&user, math_only(2)),
        practice.start(&user, math_only(2))
    );
    let rejected = [&a, &b]
        .into_iter()
        .filter(|r| matches!(r, Err(SessionError::Quota(q)) if q.is_exhausted()))
        .count();
    assert_eq!(rejected, 1);
    assert!(a.is_ok() || b.is_ok());
    assert_eq!(generator.calls(), 1);

    let task = services.quota().current(&kid(), Subject::Math).await.unwrap();
    assert_eq!(task.used(), 1);
}

#[tokio::test]
async fn fallback_question_can_be_skipped_and_regenerated() {
    let (services, _storage, generator) = setup(Clock::fixed(fixed_now()), 5);
    generator.push_error(GenerationError::RateLimited {
        retry_after: Duration::from_secs(30),
    });
    generator.push_question("3 x 3 = ?", "9");

    let practice = services.practice();
    let started = practice.start(&kid(), math_only(2)).await.unwrap();
    assert_eq!(started.phase, SessionPhase::AwaitingAnswer);
    assert!(started.can_retry);
    assert!(started.retry_at.is_some());

    let retried = practice.next(&kid(), started.id).await.unwrap();
    assert_eq!(retried.current, 1);
    assert_eq!(retried.question.as_ref().unwrap().text, "3 x 3 = ?");
    assert!(!retried.can_retry);
    assert_eq!(retried.retry_at, None);
    assert!(matches!(
        practice.next(&kid(), started.id).await,
        Err(SessionError::InvalidPhase { .. })
    ));

    let answered = practice.check_answer(&kid(), started.id, "9").await.unwrap();
    assert_eq!(answered.feedback.unwrap().verdict, AnswerVerdict::Correct);
    assert_eq!(answered.ungraded, 0);

    // Only the delivered question is charged.
    let task = services.quota().current(&kid(), Subject::Math).await.unwrap();
    assert_eq!(task.used(), 1);
    assert_eq!(generator.calls(), 2);
}

#[tokio::test]
async fn rate_limit_resets_session_after_retry_delay() {
    let clock = Clock::fixed(fixed_now());
    let (services, _storage, generator) = setup(clock, 5);
    generator.push_error(GenerationError::RateLimited {
        retry_after: Duration::from_secs(30),
    });
    generator.push_question("3 x 3 = ?", "9");

    let started = services.practice().start(&kid(), math_only(2)).await.unwrap();
    assert_eq!(
        started.retry_at,
        Some(fixed_now() + chrono::Duration::seconds(30))
    );

    // Same registry, observed through a clock past the retry delay.
    let mut later = clock;
    later.advance(chrono::Duration::seconds(31));
    let (services_later, _, _) = setup(later, 5);
    let practice_later = (*services_later.practice())
        .clone()
        .with_registry(Arc::clone(services.practice().registry()));

    let reset = practice_later.snapshot(&kid(), started.id).await.unwrap();
    assert_eq!(reset.phase, SessionPhase::Idle);
    assert_eq!(reset.current, 1);
    assert!(reset.question.is_none());
}

#[tokio::test]
async fn topics_and_seeds_feed_generation() {
    let (services, _storage, generator) = setup(Clock::fixed(fixed_now()), 5);
    let topic = services
        .topics()
        .create(TopicDraft {
            subject: Subject::Science,
            grade: 4,
            unit: "Living things".into(),
            name: "Animals".into(),
            description: None,
        })
        .await
        .unwrap();
    services
        .topics()
        .add_seed(
            topic.id,
            SeedQuestionDraft {
                text: "Is a whale a fish?".into(),
                answer: Some("No".into()),
                options: None,
                explanation: None,
                shape: None,
            },
        )
        .await
        .unwrap();
    generator.push_question("Is a bat a bird?", "No");

    let started = services
        .practice()
        .start(
            &kid(),
            StartSession {
                topic_ids: vec![topic.id],
                count: None,
                subject: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(started.subject, Subject::Science);
    assert_eq!(started.total, 10);

    let request = generator.requests.lock().unwrap()[0].clone();
    assert_eq!(request.count, 1);
    assert_eq!(request.topic.unwrap().id, topic.id);
    assert_eq!(request.seed.unwrap().text(), "Is a whale a fish?");
}

#[tokio::test]
async fn sessions_are_private_to_their_user() {
    let (services, _storage, generator) = setup(Clock::fixed(fixed_now()), 5);
    generator.push_question("5 - 1 = ?", "4");
    let started = services.practice().start(&kid(), math_only(1)).await.unwrap();

    let other = UserId::new("someone-else").unwrap();
    assert!(matches!(
        services.practice().snapshot(&other, started.id).await,
        Err(SessionError::NotFound)
    ));
    assert!(matches!(
        services.practice().next(&kid(), started.id).await,
        Err(SessionError::InvalidPhase { .. })
    ));
}

#[tokio::test]
async fn start_validates_input() {
    let (services, _storage, generator) = setup(Clock::fixed(fixed_now()), 5);
    let practice = services.practice();

    assert!(matches!(
        practice.start(&kid(), StartSession::default()).await,
        Err(SessionError::NoSubject)
    ));
    assert!(matches!(
        practice.start(&kid(), math_only(0)).await,
        Err(SessionError::InvalidCount { got: 0, .. })
    ));
    assert!(matches!(
        practice
            .start(
                &kid(),
                StartSession {
                    topic_ids: vec![quiz_core::model::TopicId::new(404)],
                    count: None,
                    subject: Some(Subject::Math),
                },
            )
            .await,
        Err(SessionError::TopicNotFound(_))
    ));
    assert_eq!(generator.calls(), 0);
}
