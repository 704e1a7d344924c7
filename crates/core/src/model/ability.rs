use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::ids::UserId;
use crate::model::subject::Subject;

/// Starting score for a subject the user has never practiced.
pub const DEFAULT_ABILITY: f64 = 50.0;
/// Step size of the per-answer update.
pub const ABILITY_K_FACTOR: f64 = 4.0;

const MIN_ABILITY: f64 = 0.0;
const MAX_ABILITY: f64 = 100.0;

/// One graded answer, in the order it was given.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GradedAnswer {
    pub correct: bool,
}

/// Per-subject ability estimate on a 0–100 scale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AbilityScore {
    pub user_id: UserId,
    pub subject: Subject,
    score: f64,
    graded_count: u32,
    pub updated_at: DateTime<Utc>,
}

impl AbilityScore {
    #[must_use]
    pub fn initial(user_id: UserId, subject: Subject, now: DateTime<Utc>) -> Self {
        Self {
            user_id,
            subject,
            score: DEFAULT_ABILITY,
            graded_count: 0,
            updated_at: now,
        }
    }

    #[must_use]
    pub fn from_persisted(
        user_id: UserId,
        subject: Subject,
        score: f64,
        graded_count: u32,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            user_id,
            subject,
            score: clamp_score(score),
            graded_count,
            updated_at,
        }
    }

    #[must_use]
    pub fn score(&self) -> f64 {
        self.score
    }

    #[must_use]
    pub fn graded_count(&self) -> u32 {
        self.graded_count
    }

    /// Apply an aggregated session delta.
    pub fn apply(&mut self, delta: f64, answers: u32, now: DateTime<Utc>) {
        self.score = clamp_score(self.score + delta);
        self.graded_count = self.graded_count.saturating_add(answers);
        self.updated_at = now;
    }
}

/// Aggregate change in ability after a sequence of graded answers.
///
/// Each answer moves the running score by `K * (actual - expected)` where
/// `expected = score / 100`, clamped to the 0–100 range. The returned value
/// is the net change from `start`.
#[must_use]
pub fn ability_delta(start: f64, answers: &[GradedAnswer]) -> f64 {
    let start = clamp_score(start);
    let end = answers.iter().fold(start, |score, answer| {
        let expected = score / MAX_ABILITY;
        let actual = if answer.correct { 1.0 } else { 0.0 };
        clamp_score(score + ABILITY_K_FACTOR * (actual - expected))
    });
    end - start
}

fn clamp_score(score: f64) -> f64 {
    if score.is_nan() {
        return DEFAULT_ABILITY;
    }
    score.clamp(MIN_ABILITY, MAX_ABILITY)
}
