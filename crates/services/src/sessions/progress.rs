use chrono::{DateTime, Utc};
use quiz_core::model::{Question, QuestionSource, SessionSummary, ShapeParams, Subject};
use serde::Serialize;

use super::practice::{AnswerFeedback, PracticeSession, SessionId, SessionPhase};

/// A question as shown to the student; the expected answer stays hidden.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuestionView {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shape: Option<ShapeParams>,
    pub source: QuestionSource,
    pub gradable: bool,
}

impl From<&Question> for QuestionView {
    fn from(question: &Question) -> Self {
        Self {
            text: question.text().to_owned(),
            options: question.options().map(<[String]>::to_vec),
            shape: question.shape().cloned(),
            source: question.source(),
            gradable: question.is_gradable(),
        }
    }
}

/// Serializable view of a session for clients.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSnapshot {
    pub id: SessionId,
    pub subject: Subject,
    pub phase: SessionPhase,
    pub total: u32,
    pub current: u32,
    pub answered: u32,
    pub correct: u32,
    pub mistakes: u32,
    pub ungraded: u32,
    pub question: Option<QuestionView>,
    pub feedback: Option<AnswerFeedback>,
    pub notice: Option<String>,
    pub retry_at: Option<DateTime<Utc>>,
    /// `next` may replace the shown placeholder without an answer.
    pub can_retry: bool,
    pub summary: Option<SessionSummary>,
}

impl From<&PracticeSession> for SessionSnapshot {
    fn from(session: &PracticeSession) -> Self {
        let stats = session.stats();
        Self {
            id: session.id(),
            subject: session.subject(),
            phase: session.phase(),
            total: stats.total(),
            current: stats.current(),
            answered: stats.answered(),
            correct: stats.correct(),
            mistakes: session.mistakes(),
            ungraded: session.ungraded(),
            question: session.current_question().map(QuestionView::from),
            feedback: session.feedback().cloned(),
            notice: session.notice().map(str::to_owned),
            retry_at: session.reset_at(),
            can_retry: session.can_retry(),
            summary: session.summary().cloned(),
        }
    }
}
