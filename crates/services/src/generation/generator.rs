use std::sync::Arc;

use async_trait::async_trait;
use quiz_core::model::{Question, Subject, Topic};

use super::client::AiClient;
use super::parse::parse_questions;
use super::prompt::{SYSTEM_PROMPT, build_generation_prompt};
use crate::error::GenerationError;

/// Questions requested per call when the caller does not say.
pub const DEFAULT_BATCH_SIZE: u32 = 3;
/// Upper bound on one batch.
pub const MAX_BATCH_SIZE: u32 = 10;

/// What to generate: a subject, optional topic context and an optional
/// template question.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub subject: Subject,
    pub topic: Option<Topic>,
    pub seed: Option<Question>,
    pub count: u32,
}

impl GenerationRequest {
    #[must_use]
    pub fn new(subject: Subject) -> Self {
        Self {
            subject,
            topic: None,
            seed: None,
            count: DEFAULT_BATCH_SIZE,
        }
    }

    #[must_use]
    pub fn with_topic(mut self, topic: Option<Topic>) -> Self {
        self.topic = topic;
        self
    }

    #[must_use]
    pub fn with_seed(mut self, seed: Option<Question>) -> Self {
        self.seed = seed;
        self
    }

    #[must_use]
    pub fn with_count(mut self, count: u32) -> Self {
        self.count = count.clamp(1, MAX_BATCH_SIZE);
        self
    }
}

/// Source of practice questions for the session sequencer.
#[async_trait]
pub trait QuestionGenerator: Send + Sync {
    /// # Errors
    ///
    /// Returns `GenerationError` if no usable question could be produced.
    async fn generate(&self, request: &GenerationRequest)
    -> Result<Vec<Question>, GenerationError>;
}

/// Generator backed by the chat-completions client.
#[derive(Clone)]
pub struct AiQuestionGenerator {
    client: Arc<AiClient>,
}

impl AiQuestionGenerator {
    #[must_use]
    pub fn new(client: Arc<AiClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl QuestionGenerator for AiQuestionGenerator {
    async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<Vec<Question>, GenerationError> {
        let prompt = build_generation_prompt(
            request.subject,
            request.topic.as_ref(),
            request.seed.as_ref(),
            request.count,
        );
        let raw = self.client.chat(SYSTEM_PROMPT, &prompt).await?;
        let mut questions = parse_questions(&raw)?;

        let limit = usize::try_from(request.count).unwrap_or(usize::MAX);
        questions.truncate(limit.max(1));
        tracing::debug!(
            subject = %request.subject,
            count = questions.len(),
            "generated questions"
        );
        Ok(questions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn count_is_clamped() {
        assert_eq!(GenerationRequest::new(Subject::Math).with_count(0).count, 1);
        assert_eq!(GenerationRequest::new(Subject::Math).with_count(99).count, MAX_BATCH_SIZE);
        assert_eq!(GenerationRequest::new(Subject::Math).count, DEFAULT_BATCH_SIZE);
    }

    #[tokio::test]
    async fn disabled_client_surfaces_disabled() {
        let generator = AiQuestionGenerator::new(Arc::new(AiClient::new(None)));
        let err = generator
            .generate(&GenerationRequest::new(Subject::Science))
            .await
            .unwrap_err();
        assert!(matches!(err, GenerationError::Disabled));
    }
}
