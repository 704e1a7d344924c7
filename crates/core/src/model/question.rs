use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::{SeedQuestionId, TopicId};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuestionError {
    #[error("question text cannot be empty")]
    EmptyText,

    #[error("multiple-choice options need at least two entries, got {0}")]
    TooFewOptions(usize),
}

//
// ─── SOURCE ────────────────────────────────────────────────────────────────────
//

/// Where a question came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuestionSource {
    /// Stored template question.
    Seed,
    /// Produced by the language model.
    Generated,
    /// Synthesized locally after a generation failure.
    Fallback,
}

//
// ─── SHAPE ─────────────────────────────────────────────────────────────────────
//

/// Geometry parameters attached to shape questions, e.g. a rectangle with
/// `width` and `height`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShapeParams {
    pub kind: String,
    #[serde(default)]
    pub dimensions: BTreeMap<String, f64>,
}

//
// ─── QUESTION ──────────────────────────────────────────────────────────────────
//

/// A single practice question. Ephemeral: lives for one session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    answer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    options: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    shape: Option<ShapeParams>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    explanation: Option<String>,
    source: QuestionSource,
}

impl Question {
    /// Build a validated question.
    ///
    /// Blank answers and explanations are normalized to `None`; an empty
    /// options list means "not multiple choice".
    ///
    /// # Errors
    ///
    /// Returns `QuestionError::EmptyText` for blank text and
    /// `QuestionError::TooFewOptions` for a single option.
    pub fn new(
        text: impl Into<String>,
        answer: Option<String>,
        options: Option<Vec<String>>,
        source: QuestionSource,
    ) -> Result<Self, QuestionError> {
        let text = text.into().trim().to_owned();
        if text.is_empty() {
            return Err(QuestionError::EmptyText);
        }

        let options = options
            .map(|opts| {
                opts.into_iter()
                    .map(|o| o.trim().to_owned())
                    .filter(|o| !o.is_empty())
                    .collect::<Vec<_>>()
            })
            .filter(|opts| !opts.is_empty());
        if let Some(opts) = options.as_ref() {
            if opts.len() < 2 {
                return Err(QuestionError::TooFewOptions(opts.len()));
            }
        }

        Ok(Self {
            text,
            answer: normalize_optional(answer),
            options,
            shape: None,
            explanation: None,
            source,
        })
    }

    /// Placeholder shown when generation fails. It carries no answer, so it
    /// is never graded.
    #[must_use]
    pub fn fallback(message: impl Into<String>) -> Self {
        let message = message.into();
        let text = if message.trim().is_empty() {
            "Question generation is unavailable right now. Please try again later.".to_owned()
        } else {
            message.trim().to_owned()
        };
        Self {
            text,
            answer: None,
            options: None,
            shape: None,
            explanation: None,
            source: QuestionSource::Fallback,
        }
    }

    #[must_use]
    pub fn with_shape(mut self, shape: Option<ShapeParams>) -> Self {
        self.shape = shape;
        self
    }

    #[must_use]
    pub fn with_explanation(mut self, explanation: Option<String>) -> Self {
        self.explanation = normalize_optional(explanation);
        self
    }

    #[must_use]
    pub fn with_source(mut self, source: QuestionSource) -> Self {
        self.source = source;
        self
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub fn answer(&self) -> Option<&str> {
        self.answer.as_deref()
    }

    #[must_use]
    pub fn options(&self) -> Option<&[String]> {
        self.options.as_deref()
    }

    #[must_use]
    pub fn shape(&self) -> Option<&ShapeParams> {
        self.shape.as_ref()
    }

    #[must_use]
    pub fn explanation(&self) -> Option<&str> {
        self.explanation.as_deref()
    }

    #[must_use]
    pub fn source(&self) -> QuestionSource {
        self.source
    }

    #[must_use]
    pub fn is_gradable(&self) -> bool {
        self.answer.is_some()
    }
}

/// A stored template question for a topic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeedQuestion {
    pub id: SeedQuestionId,
    pub topic_id: TopicId,
    pub question: Question,
}

fn normalize_optional(value: Option<String>) -> Option<String> {
    value
        .map(|val| val.trim().to_string())
        .filter(|val| !val.is_empty())
}
