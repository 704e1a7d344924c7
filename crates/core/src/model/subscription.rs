use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::ids::UserId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Plan {
    Free,
    Premium,
}

impl Plan {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Plan::Free => "free",
            Plan::Premium => "premium",
        }
    }

    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "free" => Some(Plan::Free),
            "premium" => Some(Plan::Premium),
            _ => None,
        }
    }
}

/// Billing state as reported by the payment provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Active,
    Trialing,
    PastDue,
    Canceled,
}

impl SubscriptionStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::Trialing => "trialing",
            SubscriptionStatus::PastDue => "past_due",
            SubscriptionStatus::Canceled => "canceled",
        }
    }

    /// Maps a provider status string. Unknown states (`incomplete`,
    /// `unpaid`, ...) are treated as past due.
    #[must_use]
    pub fn from_provider(raw: &str) -> Self {
        match raw {
            "active" => SubscriptionStatus::Active,
            "trialing" => SubscriptionStatus::Trialing,
            "canceled" | "cancelled" | "incomplete_expired" => SubscriptionStatus::Canceled,
            _ => SubscriptionStatus::PastDue,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    pub user_id: UserId,
    pub plan: Plan,
    pub status: SubscriptionStatus,
    pub customer_id: Option<String>,
    pub provider_subscription_id: Option<String>,
    pub current_period_end: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl Subscription {
    #[must_use]
    pub fn free(user_id: UserId, now: DateTime<Utc>) -> Self {
        Self {
            user_id,
            plan: Plan::Free,
            status: SubscriptionStatus::Active,
            customer_id: None,
            provider_subscription_id: None,
            current_period_end: None,
            updated_at: now,
        }
    }

    /// Premium features are unlocked while the subscription is paid up or trialing.
    #[must_use]
    pub fn grants_premium(&self) -> bool {
        self.plan == Plan::Premium
            && matches!(
                self.status,
                SubscriptionStatus::Active | SubscriptionStatus::Trialing
            )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;

    #[test]
    fn past_due_premium_does_not_grant_premium() {
        let mut sub = Subscription::free(UserId::new("u").unwrap(), fixed_now());
        sub.plan = Plan::Premium;
        assert!(sub.grants_premium());
        sub.status = SubscriptionStatus::PastDue;
        assert!(!sub.grants_premium());
    }

    #[test]
    fn provider_status_mapping() {
        assert_eq!(
            SubscriptionStatus::from_provider("trialing"),
            SubscriptionStatus::Trialing
        );
        assert_eq!(
            SubscriptionStatus::from_provider("unpaid"),
            SubscriptionStatus::PastDue
        );
        assert_eq!(
            SubscriptionStatus::from_provider("canceled"),
            SubscriptionStatus::Canceled
        );
    }
}
