use std::sync::Arc;

use chrono::{DateTime, Utc};
use quiz_core::model::{Plan, Subscription, SubscriptionStatus, UserId};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use storage::repository::SubscriptionRepository;

use crate::Clock;
use crate::billing::signature::SignatureVerifier;
use crate::error::BillingError;

/// What a delivered event did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum WebhookOutcome {
    Applied { event_type: String, user_id: UserId },
    /// Event type we do not act on.
    Ignored { event_type: String },
    /// Handled type, but no user could be resolved.
    Unmatched { event_type: String },
}

#[derive(Debug, Deserialize)]
struct WebhookEvent {
    #[serde(rename = "type")]
    event_type: String,
    #[serde(default)]
    data: EventData,
}

#[derive(Debug, Default, Deserialize)]
struct EventData {
    #[serde(default)]
    object: EventObject,
}

#[derive(Debug, Default, Deserialize)]
struct EventObject {
    id: Option<String>,
    status: Option<String>,
    customer: Option<String>,
    subscription: Option<String>,
    client_reference_id: Option<String>,
    current_period_end: Option<i64>,
    #[serde(default)]
    metadata: Map<String, Value>,
}

impl EventObject {
    fn metadata_user(&self) -> Option<UserId> {
        self.metadata
            .get("user_id")
            .and_then(Value::as_str)
            .or(self.client_reference_id.as_deref())
            .and_then(|raw| UserId::new(raw).ok())
    }

    fn period_end(&self) -> Option<DateTime<Utc>> {
        self.current_period_end
            .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
    }
}

/// Applies payment provider events to stored subscriptions.
#[derive(Clone)]
pub struct BillingWebhookService {
    verifier: Option<SignatureVerifier>,
    subscriptions: Arc<dyn SubscriptionRepository>,
    clock: Clock,
}

impl BillingWebhookService {
    #[must_use]
    pub fn new(
        verifier: Option<SignatureVerifier>,
        subscriptions: Arc<dyn SubscriptionRepository>,
        clock: Clock,
    ) -> Self {
        Self {
            verifier,
            subscriptions,
            clock,
        }
    }

    #[must_use]
    pub fn is_configured(&self) -> bool {
        self.verifier.is_some()
    }

    /// Verify and apply one delivery.
    ///
    /// # Errors
    ///
    /// Returns `BillingError::NotConfigured` without a secret, signature
    /// errors for unauthenticated bodies, `Payload` for unparseable JSON and
    /// `Storage` on repository failures.
    pub async fn handle(
        &self,
        signature: Option<&str>,
        body: &[u8],
    ) -> Result<WebhookOutcome, BillingError> {
        let verifier = self.verifier.as_ref().ok_or(BillingError::NotConfigured)?;
        let signature = signature.ok_or(BillingError::MissingSignature)?;
        verifier.verify(signature, body, self.clock.now())?;

        let event: WebhookEvent = serde_json::from_slice(body)?;
        let object = &event.data.object;

        let outcome = match event.event_type.as_str() {
            "checkout.session.completed" => {
                self.apply(&event.event_type, object, object.subscription.as_deref(), |sub| {
                    sub.plan = Plan::Premium;
                    sub.status = SubscriptionStatus::Active;
                })
                .await?
            }
            "customer.subscription.updated" => {
                let status = object
                    .status
                    .as_deref()
                    .map(SubscriptionStatus::from_provider);
                let period_end = object.period_end();
                self.apply(&event.event_type, object, object.id.as_deref(), |sub| {
                    if let Some(status) = status {
                        sub.status = status;
                        if matches!(
                            status,
                            SubscriptionStatus::Active | SubscriptionStatus::Trialing
                        ) {
                            sub.plan = Plan::Premium;
                        }
                    }
                    if period_end.is_some() {
                        sub.current_period_end = period_end;
                    }
                })
                .await?
            }
            "customer.subscription.deleted" => {
                self.apply(&event.event_type, object, object.id.as_deref(), |sub| {
                    sub.plan = Plan::Free;
                    sub.status = SubscriptionStatus::Canceled;
                })
                .await?
            }
            "invoice.payment_failed" => {
                self.apply(&event.event_type, object, object.subscription.as_deref(), |sub| {
                    sub.status = SubscriptionStatus::PastDue;
                })
                .await?
            }
            _ => WebhookOutcome::Ignored {
                event_type: event.event_type.clone(),
            },
        };

        match &outcome {
            WebhookOutcome::Applied { event_type, user_id } => {
                tracing::info!(event_type = %event_type, user_id = %user_id, "billing event applied");
            }
            WebhookOutcome::Ignored { event_type } => {
                tracing::debug!(event_type = %event_type, "billing event ignored");
            }
            WebhookOutcome::Unmatched { event_type } => {
                tracing::warn!(event_type = %event_type, "billing event has no matching user");
            }
        }
        Ok(outcome)
    }

    async fn apply(
        &self,
        event_type: &str,
        object: &EventObject,
        provider_subscription_id: Option<&str>,
        update: impl FnOnce(&mut Subscription),
    ) -> Result<WebhookOutcome, BillingError> {
        let Some(mut subscription) = self.resolve(object, provider_subscription_id).await? else {
            return Ok(WebhookOutcome::Unmatched {
                event_type: event_type.to_owned(),
            });
        };

        update(&mut subscription);
        if let Some(id) = provider_subscription_id {
            subscription.provider_subscription_id = Some(id.to_owned());
        }
        if object.customer.is_some() {
            subscription.customer_id.clone_from(&object.customer);
        }
        subscription.updated_at = self.clock.now();
        self.subscriptions.upsert_subscription(&subscription).await?;

        Ok(WebhookOutcome::Applied {
            event_type: event_type.to_owned(),
            user_id: subscription.user_id,
        })
    }

    async fn resolve(
        &self,
        object: &EventObject,
        provider_subscription_id: Option<&str>,
    ) -> Result<Option<Subscription>, BillingError> {
        if let Some(user_id) = object.metadata_user() {
            let existing = self.subscriptions.get_subscription(&user_id).await?;
            return Ok(Some(existing.unwrap_or_else(|| {
                Subscription::free(user_id, self.clock.now())
            })));
        }
        match provider_subscription_id {
            Some(id) => Ok(self.subscriptions.find_by_provider_subscription(id).await?),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::billing::signature::header_value;
    use quiz_core::time::fixed_now;
    use serde_json::json;
    use storage::repository::InMemoryRepository;

    const SECRET: &str = "whsec_test";

    fn service(repo: &InMemoryRepository) -> BillingWebhookService {
        BillingWebhookService::new(
            SignatureVerifier::new(SECRET),
            Arc::new(repo.clone()),
            Clock::fixed(fixed_now()),
        )
    }

    async fn deliver(
        service: &BillingWebhookService,
        payload: &Value,
    ) -> Result<WebhookOutcome, BillingError> {
        let body = serde_json::to_vec(payload).unwrap();
        let header = header_value(SECRET, fixed_now().timestamp(), &body);
        service.handle(Some(&header), &body).await
    }

    fn user() -> UserId {
        UserId::new("parent-1").unwrap()
    }

    #[tokio::test]
    async fn checkout_then_cancel_lifecycle() {
        let repo = InMemoryRepository::new();
        let billing = service(&repo);

        let outcome = deliver(
            &billing,
            &json!({
                "type": "checkout.session.completed",
                "data": {"object": {
                    "client_reference_id": "parent-1",
                    "customer": "cus_1",
                    "subscription": "sub_1"
                }}
            }),
        )
        .await
        .unwrap();
        assert_eq!(
            outcome,
            WebhookOutcome::Applied {
                event_type: "checkout.session.completed".into(),
                user_id: user()
            }
        );
        let stored = repo.get_subscription(&user()).await.unwrap().unwrap();
        assert!(stored.grants_premium());
        assert_eq!(stored.provider_subscription_id.as_deref(), Some("sub_1"));

        deliver(
            &billing,
            &json!({
                "type": "invoice.payment_failed",
                "data": {"object": {"subscription": "sub_1"}}
            }),
        )
        .await
        .unwrap();
        let stored = repo.get_subscription(&user()).await.unwrap().unwrap();
        assert_eq!(stored.status, SubscriptionStatus::PastDue);
        assert!(!stored.grants_premium());

        deliver(
            &billing,
            &json!({
                "type": "customer.subscription.deleted",
                "data": {"object": {"id": "sub_1"}}
            }),
        )
        .await
        .unwrap();
        let stored = repo.get_subscription(&user()).await.unwrap().unwrap();
        assert_eq!(stored.plan, Plan::Free);
        assert_eq!(stored.status, SubscriptionStatus::Canceled);
    }

    #[tokio::test]
    async fn subscription_update_sets_period_end() {
        let repo = InMemoryRepository::new();
        let billing = service(&repo);
        deliver(
            &billing,
            &json!({
                "type": "customer.subscription.updated",
                "data": {"object": {
                    "id": "sub_9",
                    "status": "trialing",
                    "current_period_end": 1_700_600_000,
                    "metadata": {"user_id": "parent-1"}
                }}
            }),
        )
        .await
        .unwrap();

        let stored = repo.get_subscription(&user()).await.unwrap().unwrap();
        assert_eq!(stored.status, SubscriptionStatus::Trialing);
        assert_eq!(stored.plan, Plan::Premium);
        assert_eq!(
            stored.current_period_end.map(|t| t.timestamp()),
            Some(1_700_600_000)
        );
    }

    #[tokio::test]
    async fn unknown_and_unmatched_events() {
        let repo = InMemoryRepository::new();
        let billing = service(&repo);

        let ignored = deliver(&billing, &json!({"type": "charge.refunded"}))
            .await
            .unwrap();
        assert!(matches!(ignored, WebhookOutcome::Ignored { .. }));

        let unmatched = deliver(
            &billing,
            &json!({
                "type": "customer.subscription.deleted",
                "data": {"object": {"id": "sub_missing"}}
            }),
        )
        .await
        .unwrap();
        assert!(matches!(unmatched, WebhookOutcome::Unmatched { .. }));
    }

    #[tokio::test]
    async fn rejects_missing_secret_and_signature() {
        let repo = InMemoryRepository::new();
        let unconfigured =
            BillingWebhookService::new(None, Arc::new(repo.clone()), Clock::fixed(fixed_now()));
        assert!(matches!(
            unconfigured.handle(Some("t=1,v1=00"), b"{}").await,
            Err(BillingError::NotConfigured)
        ));
        assert!(matches!(
            service(&repo).handle(None, b"{}").await,
            Err(BillingError::MissingSignature)
        ));
    }
}
