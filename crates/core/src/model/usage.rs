use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::ids::{TopicId, UserId};
use crate::model::subject::Subject;

/// Kind of telemetry event written to the usage log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UsageKind {
    QuestionGenerated,
    GenerationFailed,
    AnswerChecked,
}

impl UsageKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            UsageKind::QuestionGenerated => "question_generated",
            UsageKind::GenerationFailed => "generation_failed",
            UsageKind::AnswerChecked => "answer_checked",
        }
    }

    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "question_generated" => Some(UsageKind::QuestionGenerated),
            "generation_failed" => Some(UsageKind::GenerationFailed),
            "answer_checked" => Some(UsageKind::AnswerChecked),
            _ => None,
        }
    }
}

/// One best-effort usage log entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageEvent {
    pub user_id: UserId,
    pub subject: Subject,
    pub topic_id: Option<TopicId>,
    pub kind: UsageKind,
    /// Set for `AnswerChecked` events on graded questions.
    pub correct: Option<bool>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_string_round_trip() {
        for kind in [
            UsageKind::QuestionGenerated,
            UsageKind::GenerationFailed,
            UsageKind::AnswerChecked,
        ] {
            assert_eq!(UsageKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(UsageKind::parse("other"), None);
    }
}
