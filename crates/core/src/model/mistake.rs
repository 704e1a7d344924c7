use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::ids::{MistakeId, TopicId, UserId};
use crate::model::question::Question;
use crate::model::subject::Subject;

/// A wrong answer waiting to be persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewMistake {
    pub user_id: UserId,
    pub subject: Subject,
    pub topic_id: Option<TopicId>,
    pub question: Question,
    pub wrong_answer: String,
    pub recorded_at: DateTime<Utc>,
}

impl NewMistake {
    #[must_use]
    pub fn assign_id(self, id: MistakeId) -> MistakeRecord {
        MistakeRecord {
            id,
            user_id: self.user_id,
            subject: self.subject,
            topic_id: self.topic_id,
            question: self.question,
            wrong_answer: self.wrong_answer,
            recorded_at: self.recorded_at,
        }
    }
}

/// A persisted wrong answer in a user's mistake book.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MistakeRecord {
    pub id: MistakeId,
    pub user_id: UserId,
    pub subject: Subject,
    pub topic_id: Option<TopicId>,
    pub question: Question,
    pub wrong_answer: String,
    pub recorded_at: DateTime<Utc>,
}
