use chrono::{DateTime, FixedOffset, NaiveDate, Offset, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::UserId;
use crate::model::subject::Subject;
use crate::model::subscription::Subscription;
use crate::time::local_date;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuotaError {
    #[error("daily quota for {subject} exhausted ({used}/{limit})")]
    Exhausted {
        subject: Subject,
        used: u32,
        limit: u32,
    },

    #[error("UTC offset of {0} minutes is out of range")]
    InvalidOffset(i32),
}

//
// ─── POLICY ────────────────────────────────────────────────────────────────────
//

/// How daily quotas are sized and when they roll over.
///
/// A quota day is the calendar date in a fixed UTC offset; the counter
/// restarts the first time a task is read on a later date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaPolicy {
    offset: FixedOffset,
    free_limit: u32,
    premium_limit: u32,
}

impl QuotaPolicy {
    pub const DEFAULT_FREE_LIMIT: u32 = 10;
    pub const DEFAULT_PREMIUM_LIMIT: u32 = 50;

    /// # Errors
    ///
    /// Returns `QuotaError::InvalidOffset` if the offset is not within ±24h.
    pub fn new(
        offset_minutes: i32,
        free_limit: u32,
        premium_limit: u32,
    ) -> Result<Self, QuotaError> {
        let offset = offset_minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .ok_or(QuotaError::InvalidOffset(offset_minutes))?;
        Ok(Self {
            offset,
            free_limit,
            premium_limit,
        })
    }

    #[must_use]
    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    /// Quota day containing `now`.
    #[must_use]
    pub fn day_of(&self, now: DateTime<Utc>) -> NaiveDate {
        local_date(now, self.offset)
    }

    /// Daily limit for a user given their (optional) subscription.
    #[must_use]
    pub fn limit_for(&self, subscription: Option<&Subscription>) -> u32 {
        if subscription.is_some_and(Subscription::grants_premium) {
            self.premium_limit
        } else {
            self.free_limit
        }
    }
}

impl Default for QuotaPolicy {
    fn default() -> Self {
        Self {
            offset: Utc.fix(),
            free_limit: Self::DEFAULT_FREE_LIMIT,
            premium_limit: Self::DEFAULT_PREMIUM_LIMIT,
        }
    }
}

//
// ─── DAILY TASK ────────────────────────────────────────────────────────────────
//

/// Per-user, per-subject question budget for one quota day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyTask {
    pub user_id: UserId,
    pub subject: Subject,
    pub day: NaiveDate,
    used: u32,
    limit: u32,
}

impl DailyTask {
    #[must_use]
    pub fn fresh(user_id: UserId, subject: Subject, day: NaiveDate, limit: u32) -> Self {
        Self {
            user_id,
            subject,
            day,
            used: 0,
            limit,
        }
    }

    /// Rehydrate a stored task. `used` may exceed `limit` if the plan was
    /// downgraded mid-day.
    #[must_use]
    pub fn from_persisted(
        user_id: UserId,
        subject: Subject,
        day: NaiveDate,
        used: u32,
        limit: u32,
    ) -> Self {
        Self {
            user_id,
            subject,
            day,
            used,
            limit,
        }
    }

    /// Bring a stored task forward to `today` with the current limit.
    ///
    /// Tasks from an earlier day restart at zero; tasks from today keep
    /// their counter.
    #[must_use]
    pub fn rolled_to(self, today: NaiveDate, limit: u32) -> Self {
        if self.day < today {
            Self::fresh(self.user_id, self.subject, today, limit)
        } else {
            Self { limit, ..self }
        }
    }

    #[must_use]
    pub fn used(&self) -> u32 {
        self.used
    }

    #[must_use]
    pub fn limit(&self) -> u32 {
        self.limit
    }

    #[must_use]
    pub fn remaining(&self) -> u32 {
        self.limit.saturating_sub(self.used)
    }

    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.used >= self.limit
    }

    /// Fail with `QuotaError::Exhausted` if no budget remains.
    ///
    /// # Errors
    ///
    /// Returns `QuotaError::Exhausted` once `used >= limit`.
    pub fn ensure_available(&self) -> Result<(), QuotaError> {
        if self.is_exhausted() {
            return Err(QuotaError::Exhausted {
                subject: self.subject,
                used: self.used,
                limit: self.limit,
            });
        }
        Ok(())
    }

    /// Count one generated question against the budget.
    ///
    /// # Errors
    ///
    /// Returns `QuotaError::Exhausted` without changing `used` if no budget remains.
    pub fn record_use(&mut self) -> Result<(), QuotaError> {
        self.ensure_available()?;
        self.used += 1;
        Ok(())
    }

    /// Give back one unit taken by [`DailyTask::record_use`].
    pub fn release_use(&mut self) {
        self.used = self.used.saturating_sub(1);
    }
}
