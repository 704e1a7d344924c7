use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::subject::Subject;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SessionStatsError {
    #[error("session needs at least one question")]
    EmptySession,

    #[error("cannot advance past question {total}")]
    PastEnd { total: u32 },
}

/// Counters for one practice session.
///
/// `current` is the 1-based number of the question being shown (0 before
/// the first one). `current <= total` and `correct <= answered` always hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStats {
    total: u32,
    current: u32,
    correct: u32,
    answered: u32,
}

impl SessionStats {
    /// # Errors
    ///
    /// Returns `SessionStatsError::EmptySession` for `total == 0`.
    pub fn new(total: u32) -> Result<Self, SessionStatsError> {
        if total == 0 {
            return Err(SessionStatsError::EmptySession);
        }
        Ok(Self {
            total,
            current: 0,
            correct: 0,
            answered: 0,
        })
    }

    #[must_use]
    pub fn total(&self) -> u32 {
        self.total
    }

    #[must_use]
    pub fn current(&self) -> u32 {
        self.current
    }

    #[must_use]
    pub fn correct(&self) -> u32 {
        self.correct
    }

    #[must_use]
    pub fn answered(&self) -> u32 {
        self.answered
    }

    #[must_use]
    pub fn has_more(&self) -> bool {
        self.current < self.total
    }

    /// Move to the next question number.
    ///
    /// # Errors
    ///
    /// Returns `SessionStatsError::PastEnd` if every question was already shown.
    pub fn advance(&mut self) -> Result<u32, SessionStatsError> {
        if !self.has_more() {
            return Err(SessionStatsError::PastEnd { total: self.total });
        }
        self.current += 1;
        Ok(self.current)
    }

    pub fn record_answer(&mut self, correct: bool) {
        self.answered = self.answered.saturating_add(1);
        if correct {
            self.correct = self.correct.saturating_add(1);
        }
    }
}

/// Ability movement for one subject at the end of a session.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SubjectDelta {
    pub subject: Subject,
    pub before: f64,
    pub delta: f64,
    pub graded: u32,
}

/// Terminal report of a practice session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub subject: Subject,
    pub stats: SessionStats,
    pub ungraded: u32,
    pub mistakes: u32,
    pub ability: SubjectDelta,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    /// True when the daily quota ran out before every question was shown.
    pub ended_early: bool,
}

impl SessionSummary {
    /// Share of graded answers that were correct, in `0.0..=1.0`.
    #[must_use]
    pub fn accuracy(&self) -> f64 {
        let graded = self.stats.answered().saturating_sub(self.ungraded);
        if graded == 0 {
            return 0.0;
        }
        f64::from(self.stats.correct()) / f64::from(graded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stats_never_pass_total() {
        let mut stats = SessionStats::new(2).unwrap();
        assert_eq!(stats.advance().unwrap(), 1);
        assert_eq!(stats.advance().unwrap(), 2);
        assert!(!stats.has_more());
        assert_eq!(
            stats.advance().unwrap_err(),
            SessionStatsError::PastEnd { total: 2 }
        );
        assert_eq!(stats.current(), 2);
    }

    #[test]
    fn empty_session_rejected() {
        assert_eq!(
            SessionStats::new(0).unwrap_err(),
            SessionStatsError::EmptySession
        );
    }

    #[test]
    fn record_answer_counts_correct() {
        let mut stats = SessionStats::new(3).unwrap();
        stats.record_answer(true);
        stats.record_answer(false);
        assert_eq!(stats.answered(), 2);
        assert_eq!(stats.correct(), 1);
    }
}
