use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::TopicId;
use crate::model::subject::Subject;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum TopicError {
    #[error("topic name cannot be empty")]
    EmptyName,

    #[error("topic unit cannot be empty")]
    EmptyUnit,

    #[error("grade must be between 1 and 6, got {0}")]
    InvalidGrade(u8),
}

/// Unvalidated topic input, as submitted by an admin or the seed command.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TopicDraft {
    pub subject: Subject,
    pub grade: u8,
    pub unit: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

impl TopicDraft {
    /// Validate the draft and stamp it with its creation time.
    ///
    /// # Errors
    ///
    /// Returns `TopicError` for blank names/units or out-of-range grades.
    pub fn validate(self, now: DateTime<Utc>) -> Result<ValidatedTopic, TopicError> {
        let name = self.name.trim().to_owned();
        if name.is_empty() {
            return Err(TopicError::EmptyName);
        }
        let unit = self.unit.trim().to_owned();
        if unit.is_empty() {
            return Err(TopicError::EmptyUnit);
        }
        if !(1..=6).contains(&self.grade) {
            return Err(TopicError::InvalidGrade(self.grade));
        }
        let description = self
            .description
            .map(|d| d.trim().to_owned())
            .filter(|d| !d.is_empty());

        Ok(ValidatedTopic {
            subject: self.subject,
            grade: self.grade,
            unit,
            name,
            description,
            created_at: now,
        })
    }
}

/// A validated topic that has not been assigned an id yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedTopic {
    pub subject: Subject,
    pub grade: u8,
    pub unit: String,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl ValidatedTopic {
    #[must_use]
    pub fn assign_id(self, id: TopicId) -> Topic {
        Topic {
            id,
            subject: self.subject,
            grade: self.grade,
            unit: self.unit,
            name: self.name,
            description: self.description,
            created_at: self.created_at,
        }
    }
}

/// A curriculum unit practice sessions draw questions from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topic {
    pub id: TopicId,
    pub subject: Subject,
    pub grade: u8,
    pub unit: String,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Topic {
    /// Re-validate fields with new content while keeping identity and creation time.
    ///
    /// # Errors
    ///
    /// Returns `TopicError` if the draft is invalid.
    pub fn apply_draft(&self, draft: TopicDraft) -> Result<Topic, TopicError> {
        Ok(draft.validate(self.created_at)?.assign_id(self.id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;

    fn draft() -> TopicDraft {
        TopicDraft {
            subject: Subject::Math,
            grade: 3,
            unit: " Unit 2 ".into(),
            name: " Fractions ".into(),
            description: Some("  ".into()),
        }
    }

    #[test]
    fn validate_trims_and_normalizes() {
        let topic = draft().validate(fixed_now()).unwrap().assign_id(TopicId::new(1));
        assert_eq!(topic.name, "Fractions");
        assert_eq!(topic.unit, "Unit 2");
        assert_eq!(topic.description, None);
    }

    #[test]
    fn validate_rejects_bad_grade() {
        let mut d = draft();
        d.grade = 9;
        assert_eq!(
            d.validate(fixed_now()).unwrap_err(),
            TopicError::InvalidGrade(9)
        );
    }

    #[test]
    fn apply_draft_keeps_identity() {
        let topic = draft().validate(fixed_now()).unwrap().assign_id(TopicId::new(5));
        let mut d = draft();
        d.name = "Decimals".into();
        let updated = topic.apply_draft(d).unwrap();
        assert_eq!(updated.id, TopicId::new(5));
        assert_eq!(updated.name, "Decimals");
        assert_eq!(updated.created_at, topic.created_at);
    }
}
