use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use quiz_core::model::{
    AnswerVerdict, GradedAnswer, Question, SessionStats, SessionStatsError, SessionSummary,
    Subject, Topic, TopicId, UserId, check_answer,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::SessionError;

/// Identifier of an in-flight practice session.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(Uuid);

impl SessionId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SessionId({})", self.0)
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for SessionId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim()).map(Self)
    }
}

/// Where a session is in its question loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    Idle,
    Generating,
    AwaitingAnswer,
    Answered,
    Summary,
}

impl SessionPhase {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            SessionPhase::Idle => "idle",
            SessionPhase::Generating => "generating",
            SessionPhase::AwaitingAnswer => "awaiting_answer",
            SessionPhase::Answered => "answered",
            SessionPhase::Summary => "summary",
        }
    }
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of the most recent answer, shown until the next question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnswerFeedback {
    pub answer: String,
    pub verdict: AnswerVerdict,
    pub expected: Option<String>,
    pub explanation: Option<String>,
}

/// State of one practice run.
///
/// Pure state machine: no I/O happens here. A question "slot" opens when
/// the counter advances and closes when that slot is answered, so a
/// failed or reset generation retries the same question number.
#[derive(Debug, Clone)]
pub struct PracticeSession {
    id: SessionId,
    user_id: UserId,
    subject: Subject,
    topics: Vec<Topic>,
    phase: SessionPhase,
    stats: SessionStats,
    current: Option<Question>,
    current_topic: Option<TopicId>,
    graded: Vec<GradedAnswer>,
    mistakes: u32,
    ungraded: u32,
    slot_open: bool,
    feedback: Option<AnswerFeedback>,
    notice: Option<String>,
    reset_at: Option<DateTime<Utc>>,
    summary: Option<SessionSummary>,
    started_at: DateTime<Utc>,
    last_activity: DateTime<Utc>,
}

impl PracticeSession {
    /// # Errors
    ///
    /// Returns `SessionStatsError::EmptySession` for `total == 0`.
    pub fn new(
        id: SessionId,
        user_id: UserId,
        subject: Subject,
        topics: Vec<Topic>,
        total: u32,
        now: DateTime<Utc>,
    ) -> Result<Self, SessionStatsError> {
        Ok(Self {
            id,
            user_id,
            subject,
            topics,
            phase: SessionPhase::Idle,
            stats: SessionStats::new(total)?,
            current: None,
            current_topic: None,
            graded: Vec::new(),
            mistakes: 0,
            ungraded: 0,
            slot_open: false,
            feedback: None,
            notice: None,
            reset_at: None,
            summary: None,
            started_at: now,
            last_activity: now,
        })
    }

    // ─── Accessors ───────────────────────────────────────────────────────────

    #[must_use]
    pub fn id(&self) -> SessionId {
        self.id
    }

    #[must_use]
    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    #[must_use]
    pub fn subject(&self) -> Subject {
        self.subject
    }

    #[must_use]
    pub fn topics(&self) -> &[Topic] {
        &self.topics
    }

    #[must_use]
    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    #[must_use]
    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    #[must_use]
    pub fn current_question(&self) -> Option<&Question> {
        self.current.as_ref()
    }

    /// Topic the current question was generated for, if known.
    #[must_use]
    pub fn current_topic(&self) -> Option<TopicId> {
        self.current_topic
    }

    #[must_use]
    pub fn graded_answers(&self) -> &[GradedAnswer] {
        &self.graded
    }

    #[must_use]
    pub fn mistakes(&self) -> u32 {
        self.mistakes
    }

    #[must_use]
    pub fn ungraded(&self) -> u32 {
        self.ungraded
    }

    /// True while the current question number still awaits an answer.
    #[must_use]
    pub fn slot_open(&self) -> bool {
        self.slot_open
    }

    /// True when another question should be generated before the summary.
    #[must_use]
    pub fn needs_question(&self) -> bool {
        self.slot_open || self.stats.has_more()
    }

    #[must_use]
    pub fn feedback(&self) -> Option<&AnswerFeedback> {
        self.feedback.as_ref()
    }

    #[must_use]
    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    #[must_use]
    pub fn reset_at(&self) -> Option<DateTime<Utc>> {
        self.reset_at
    }

    #[must_use]
    pub fn summary(&self) -> Option<&SessionSummary> {
        self.summary.as_ref()
    }

    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    #[must_use]
    pub fn last_activity(&self) -> DateTime<Utc> {
        self.last_activity
    }

    // ─── Transitions ─────────────────────────────────────────────────────────

    /// Whether the shown question is a placeholder that can be replaced
    /// without answering it.
    #[must_use]
    pub fn can_retry(&self) -> bool {
        self.phase == SessionPhase::AwaitingAnswer
            && self.current.as_ref().is_some_and(|q| !q.is_gradable())
    }

    /// Enter `Generating`, opening the next slot unless one is still open.
    ///
    /// A placeholder question may be replaced: its slot stays open and the
    /// same question number is generated again.
    ///
    /// Returns the 1-based question number being generated.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Completed` after the summary,
    /// `SessionError::InvalidPhase` while a real question awaits an answer,
    /// and `SessionError::Stats` when every question was already shown.
    pub fn begin_generation(&mut self, now: DateTime<Utc>) -> Result<u32, SessionError> {
        match self.phase {
            SessionPhase::Summary => return Err(SessionError::Completed),
            SessionPhase::AwaitingAnswer if !self.can_retry() => {
                return Err(SessionError::InvalidPhase {
                    action: "generate a question",
                    phase: self.phase,
                });
            }
            SessionPhase::Idle
            | SessionPhase::AwaitingAnswer
            | SessionPhase::Answered
            | SessionPhase::Generating => {}
        }

        if !self.slot_open {
            self.stats.advance()?;
            self.slot_open = true;
        }
        self.phase = SessionPhase::Generating;
        self.current = None;
        self.current_topic = None;
        self.feedback = None;
        self.notice = None;
        self.reset_at = None;
        self.last_activity = now;
        Ok(self.stats.current())
    }

    /// Show `question` and wait for an answer.
    pub fn present(&mut self, question: Question, topic: Option<TopicId>, now: DateTime<Utc>) {
        self.current = Some(question);
        self.current_topic = topic;
        self.phase = SessionPhase::AwaitingAnswer;
        self.last_activity = now;
    }

    /// Attach a user-facing message, e.g. why a placeholder question is shown.
    pub fn set_notice(&mut self, notice: impl Into<String>) {
        self.notice = Some(notice.into());
    }

    /// Grade `answer` against the current question and close the slot.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Completed` after the summary and
    /// `SessionError::InvalidPhase` when no question awaits an answer.
    pub fn record_answer(
        &mut self,
        answer: &str,
        now: DateTime<Utc>,
    ) -> Result<AnswerVerdict, SessionError> {
        if self.phase == SessionPhase::Summary {
            return Err(SessionError::Completed);
        }
        let question = match (&self.phase, &self.current) {
            (SessionPhase::AwaitingAnswer, Some(question)) => question,
            _ => {
                return Err(SessionError::InvalidPhase {
                    action: "check an answer",
                    phase: self.phase,
                });
            }
        };

        let verdict = check_answer(question, answer);
        match verdict {
            AnswerVerdict::Correct | AnswerVerdict::Incorrect => {
                let correct = verdict.is_correct();
                self.stats.record_answer(correct);
                self.graded.push(GradedAnswer { correct });
                if !correct {
                    self.mistakes = self.mistakes.saturating_add(1);
                }
            }
            AnswerVerdict::Ungraded => {
                self.stats.record_answer(false);
                self.ungraded = self.ungraded.saturating_add(1);
            }
        }

        self.feedback = Some(AnswerFeedback {
            answer: answer.trim().to_owned(),
            verdict,
            expected: question.answer().map(str::to_owned),
            explanation: question.explanation().map(str::to_owned),
        });
        self.slot_open = false;
        self.reset_at = None;
        self.phase = SessionPhase::Answered;
        self.last_activity = now;
        Ok(verdict)
    }

    /// Return to `Idle` at `at`, e.g. once an upstream rate limit lifts.
    pub fn schedule_reset(&mut self, at: DateTime<Utc>) {
        self.reset_at = Some(at);
    }

    /// Apply a due reset. Returns whether the session changed.
    pub fn apply_pending_reset(&mut self, now: DateTime<Utc>) -> bool {
        let due = self.reset_at.is_some_and(|at| at <= now);
        if !due || self.phase == SessionPhase::Summary {
            return false;
        }
        self.reset_at = None;
        self.phase = SessionPhase::Idle;
        self.current = None;
        self.feedback = None;
        self.notice = None;
        true
    }

    /// Move to the terminal summary state.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Completed` if the session already has a summary.
    pub fn finish(&mut self, summary: SessionSummary) -> Result<&SessionSummary, SessionError> {
        if self.summary.is_some() {
            return Err(SessionError::Completed);
        }
        self.phase = SessionPhase::Summary;
        self.current = None;
        self.slot_open = false;
        self.reset_at = None;
        self.last_activity = summary.completed_at;
        Ok(self.summary.insert(summary))
    }
}
