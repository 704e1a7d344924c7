use std::sync::Arc;

use quiz_core::model::{
    Question, QuestionSource, SeedQuestion, ShapeParams, Subject, Topic, TopicDraft, TopicId,
};
use serde::Deserialize;
use storage::repository::{SeedQuestionRepository, StorageError, TopicRepository};

use crate::Clock;
use crate::error::TopicServiceError;

/// Seed question input as submitted by an admin.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SeedQuestionDraft {
    #[serde(alias = "question")]
    pub text: String,
    #[serde(default)]
    pub answer: Option<String>,
    #[serde(default)]
    pub options: Option<Vec<String>>,
    #[serde(default)]
    pub explanation: Option<String>,
    #[serde(default)]
    pub shape: Option<ShapeParams>,
}

impl SeedQuestionDraft {
    /// # Errors
    ///
    /// Returns `QuestionError` for blank text or a single option.
    pub fn into_question(
        self,
        source: QuestionSource,
    ) -> Result<Question, quiz_core::model::QuestionError> {
        Ok(Question::new(self.text, self.answer, self.options, source)?
            .with_explanation(self.explanation)
            .with_shape(self.shape))
    }
}

/// Topic and seed question management.
#[derive(Clone)]
pub struct TopicService {
    clock: Clock,
    topics: Arc<dyn TopicRepository>,
    seeds: Arc<dyn SeedQuestionRepository>,
}

impl TopicService {
    #[must_use]
    pub fn new(
        clock: Clock,
        topics: Arc<dyn TopicRepository>,
        seeds: Arc<dyn SeedQuestionRepository>,
    ) -> Self {
        Self {
            clock,
            topics,
            seeds,
        }
    }

    /// # Errors
    ///
    /// Returns `TopicServiceError::Storage` on repository failures.
    pub async fn list(&self, subject: Option<Subject>) -> Result<Vec<Topic>, TopicServiceError> {
        Ok(self.topics.list_topics(subject).await?)
    }

    /// # Errors
    ///
    /// Returns `TopicServiceError::NotFound` for unknown ids.
    pub async fn get(&self, id: TopicId) -> Result<Topic, TopicServiceError> {
        self.topics
            .get_topic(id)
            .await?
            .ok_or(TopicServiceError::NotFound(id))
    }

    /// Validate and store a new topic.
    ///
    /// # Errors
    ///
    /// Returns `TopicServiceError::Topic` for invalid drafts.
    pub async fn create(&self, draft: TopicDraft) -> Result<Topic, TopicServiceError> {
        let validated = draft.validate(self.clock.now())?;
        let topic = self.topics.insert_topic(validated).await?;
        tracing::info!(topic_id = %topic.id, subject = %topic.subject, "topic created");
        Ok(topic)
    }

    /// Replace a topic's fields, keeping its id and creation time.
    ///
    /// # Errors
    ///
    /// Returns `TopicServiceError::NotFound` for unknown ids and
    /// `TopicServiceError::Topic` for invalid drafts.
    pub async fn update(&self, id: TopicId, draft: TopicDraft) -> Result<Topic, TopicServiceError> {
        let existing = self.get(id).await?;
        let updated = existing.apply_draft(draft)?;
        self.topics
            .update_topic(&updated)
            .await
            .map_err(|err| not_found_as(err, id))?;
        Ok(updated)
    }

    /// Delete a topic and its seed questions.
    ///
    /// # Errors
    ///
    /// Returns `TopicServiceError::NotFound` for unknown ids.
    pub async fn delete(&self, id: TopicId) -> Result<(), TopicServiceError> {
        self.topics
            .delete_topic(id)
            .await
            .map_err(|err| not_found_as(err, id))?;
        tracing::info!(topic_id = %id, "topic deleted");
        Ok(())
    }

    /// Attach a seed question to a topic.
    ///
    /// # Errors
    ///
    /// Returns `TopicServiceError::NotFound` for unknown topics and
    /// `TopicServiceError::Question` for invalid drafts.
    pub async fn add_seed(
        &self,
        topic_id: TopicId,
        draft: SeedQuestionDraft,
    ) -> Result<SeedQuestion, TopicServiceError> {
        let question = draft.into_question(QuestionSource::Seed)?;
        self.seeds
            .insert_seed(topic_id, &question)
            .await
            .map_err(|err| not_found_as(err, topic_id))
    }

    /// # Errors
    ///
    /// Returns `TopicServiceError::Storage` on repository failures.
    pub async fn seeds_for(
        &self,
        topic_ids: &[TopicId],
    ) -> Result<Vec<SeedQuestion>, TopicServiceError> {
        Ok(self.seeds.seeds_for_topics(topic_ids).await?)
    }
}

fn not_found_as(err: StorageError, id: TopicId) -> TopicServiceError {
    match err {
        StorageError::NotFound => TopicServiceError::NotFound(id),
        other => TopicServiceError::Storage(other),
    }
}
