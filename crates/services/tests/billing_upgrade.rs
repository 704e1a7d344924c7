use quiz_core::model::{Plan, QuotaPolicy, Subject, UserId};
use quiz_core::time::fixed_now;
use serde_json::json;
use services::billing::header_value;
use services::{AppServices, BillingError, Clock, ServicesConfig, WebhookOutcome};

const SECRET: &str = "whsec_integration";

fn services() -> AppServices {
    AppServices::in_memory(
        Clock::fixed(fixed_now()),
        ServicesConfig {
            quota: QuotaPolicy::new(0, 3, 30).unwrap(),
            billing_secret: Some(SECRET.into()),
            ..ServicesConfig::default()
        },
    )
}

#[tokio::test]
async fn checkout_raises_daily_limit() {
    let services = services();
    let parent = UserId::new("family-7").unwrap();

    let before = services.quota().current(&parent, Subject::Math).await.unwrap();
    assert_eq!(before.limit(), 3);

    let body = serde_json::to_vec(&json!({
        "type": "checkout.session.completed",
        "data": {"object": {
            "metadata": {"user_id": "family-7"},
            "customer": "cus_7",
            "subscription": "sub_7"
        }}
    }))
    .unwrap();
    let header = header_value(SECRET, fixed_now().timestamp(), &body);

    let outcome = services.billing().handle(Some(&header), &body).await.unwrap();
    assert!(matches!(outcome, WebhookOutcome::Applied { .. }));

    let after = services.quota().current(&parent, Subject::Math).await.unwrap();
    assert_eq!(after.limit(), 30);

    let dashboard = services.dashboard().for_user(&parent).await.unwrap();
    assert_eq!(dashboard.plan, Plan::Premium);
    assert!(dashboard.premium);
}

#[tokio::test]
async fn tampered_delivery_changes_nothing() {
    let services = services();
    let parent = UserId::new("family-8").unwrap();
    let body = br#"{"type":"checkout.session.completed","data":{"object":{"client_reference_id":"family-8"}}}"#;
    let header = header_value(SECRET, fixed_now().timestamp(), body);
    let tampered = String::from_utf8_lossy(body).replace("family-8", "family-9");

    let err = services
        .billing()
        .handle(Some(&header), tampered.as_bytes())
        .await
        .unwrap_err();
    assert!(matches!(err, BillingError::SignatureMismatch));

    let task = services.quota().current(&parent, Subject::Math).await.unwrap();
    assert_eq!(task.limit(), 3);
}
