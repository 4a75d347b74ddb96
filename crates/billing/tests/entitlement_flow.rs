//! Integration tests for the entitlement reconciliation flow
//!
//! These run against a real Postgres with the migrations applied and
//! exercise the webhook reconciler, the verification poller, and the
//! paywall gate end to end.
//!
//! ## Running
//! ```bash
//! export DATABASE_URL="postgres://localhost/jobtrail_test"
//! cargo test -p jobtrail-billing -- --ignored --test-threads=1
//! ```

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

use std::sync::Arc;

use jobtrail_billing::{
    BillingService, EntitlementStore, PaywallDecision, SessionPaymentStatus, StripeConfig,
    WebhookEnvelope,
};
use jobtrail_billing::mock::MockGateway;
use sqlx::PgPool;
use uuid::Uuid;

async fn test_pool() -> PgPool {
    let database_url =
        std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for integration tests");
    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .expect("Failed to connect to test database");
    sqlx::migrate!("../../migrations")
        .run(&pool)
        .await
        .expect("Failed to run migrations");
    pool
}

fn test_config() -> StripeConfig {
    StripeConfig {
        secret_key: "sk_test_dummy".to_string(),
        webhook_secret: "whsec_test_secret".to_string(),
        premium_price_cents: 600,
        app_base_url: "https://app.example.test".to_string(),
    }
}

fn service_with(pool: PgPool, gateway: MockGateway) -> BillingService {
    BillingService::new(test_config(), pool, Arc::new(gateway))
}

async fn insert_profile(pool: &PgPool, customer_id: Option<&str>) -> Uuid {
    let user_id = Uuid::new_v4();
    sqlx::query(
        "INSERT INTO profiles (id, full_name, has_premium, stripe_customer_id) VALUES ($1, $2, FALSE, $3)",
    )
    .bind(user_id)
    .bind("Test User")
    .bind(customer_id)
    .execute(pool)
    .await
    .unwrap();
    user_id
}

async fn insert_application(pool: &PgPool, user_id: Uuid) {
    sqlx::query(
        r#"
        INSERT INTO job_applications (id, user_id, company_name, job_title, status, priority, application_date)
        VALUES ($1, $2, 'Acme', 'Engineer', 'Applied', 'Medium', CURRENT_DATE)
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .execute(pool)
    .await
    .unwrap();
}

fn completed_checkout_payload(event_id: &str, user_id: Uuid, payment_ref: &str) -> String {
    format!(
        r#"{{
            "id": "{event_id}",
            "type": "checkout.session.completed",
            "data": {{
                "object": {{
                    "id": "cs_live_1",
                    "payment_intent": "{payment_ref}",
                    "amount_total": 600,
                    "currency": "usd",
                    "metadata": {{ "user_id": "{user_id}" }}
                }}
            }}
        }}"#
    )
}

// ============================================================================
// Webhook reconciler
// ============================================================================

#[tokio::test]
#[ignore] // Requires database
async fn duplicate_completion_event_grants_once() {
    let pool = test_pool().await;
    let service = service_with(pool.clone(), MockGateway::new());
    let user_id = insert_profile(&pool, None).await;

    let payment_ref = format!("pi_{}", Uuid::new_v4().simple());
    let payload = completed_checkout_payload(&format!("evt_{}", Uuid::new_v4().simple()), user_id, &payment_ref);
    let envelope = WebhookEnvelope::decode(&payload).unwrap();

    service.webhooks.handle_event(envelope.clone()).await.unwrap();
    // Same event id delivered again: recognized no-op
    service.webhooks.handle_event(envelope).await.unwrap();

    let store = EntitlementStore::new(pool.clone());
    assert!(store.has_premium(user_id).await.unwrap());

    let payments = store.payments_for_user(user_id, 10).await.unwrap();
    assert_eq!(payments.len(), 1, "exactly one audit row per payment ref");
    assert_eq!(payments[0].stripe_payment_ref, payment_ref);
}

#[tokio::test]
#[ignore] // Requires database
async fn replay_with_fresh_event_id_still_deduplicates_payment() {
    let pool = test_pool().await;
    let service = service_with(pool.clone(), MockGateway::new());
    let user_id = insert_profile(&pool, None).await;

    let payment_ref = format!("pi_{}", Uuid::new_v4().simple());
    for _ in 0..2 {
        let payload = completed_checkout_payload(
            &format!("evt_{}", Uuid::new_v4().simple()),
            user_id,
            &payment_ref,
        );
        let envelope = WebhookEnvelope::decode(&payload).unwrap();
        service.webhooks.handle_event(envelope).await.unwrap();
    }

    let store = EntitlementStore::new(pool.clone());
    assert!(store.has_premium(user_id).await.unwrap());
    let payments = store.payments_for_user(user_id, 10).await.unwrap();
    assert_eq!(payments.len(), 1);
}

#[tokio::test]
#[ignore] // Requires database
async fn errored_event_is_reclaimed_on_redelivery() {
    let pool = test_pool().await;
    let service = service_with(pool.clone(), MockGateway::new());
    let user_id = insert_profile(&pool, None).await;

    // A prior delivery failed transiently and left the ledger row in 'error'
    let event_id = format!("evt_{}", Uuid::new_v4().simple());
    sqlx::query(
        r#"
        INSERT INTO stripe_webhook_events (id, stripe_event_id, event_type, processing_result, error_message)
        VALUES ($1, $2, 'checkout.session.completed', 'error', 'store write failure')
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(&event_id)
    .execute(&pool)
    .await
    .unwrap();

    let payment_ref = format!("pi_{}", Uuid::new_v4().simple());
    let payload = completed_checkout_payload(&event_id, user_id, &payment_ref);
    let envelope = WebhookEnvelope::decode(&payload).unwrap();
    service.webhooks.handle_event(envelope).await.unwrap();

    let store = EntitlementStore::new(pool.clone());
    assert!(store.has_premium(user_id).await.unwrap(), "retry must re-apply");
}

#[tokio::test]
#[ignore] // Requires database
async fn cancellation_revokes_known_customer() {
    let pool = test_pool().await;
    let service = service_with(pool.clone(), MockGateway::new());
    let customer = format!("cus_{}", Uuid::new_v4().simple());
    let user_id = insert_profile(&pool, Some(&customer)).await;

    let store = EntitlementStore::new(pool.clone());
    store.grant(user_id, None).await.unwrap();

    let payload = format!(
        r#"{{
            "id": "evt_{}",
            "type": "customer.subscription.deleted",
            "data": {{ "object": {{ "id": "sub_1", "customer": "{customer}" }} }}
        }}"#,
        Uuid::new_v4().simple()
    );
    let envelope = WebhookEnvelope::decode(&payload).unwrap();
    service.webhooks.handle_event(envelope).await.unwrap();

    assert!(!store.has_premium(user_id).await.unwrap());
}

#[tokio::test]
#[ignore] // Requires database
async fn cancellation_for_unknown_customer_is_acknowledged() {
    let pool = test_pool().await;
    let service = service_with(pool.clone(), MockGateway::new());

    let payload = format!(
        r#"{{
            "id": "evt_{}",
            "type": "customer.subscription.deleted",
            "data": {{ "object": {{ "id": "sub_1", "customer": "cus_nobody" }} }}
        }}"#,
        Uuid::new_v4().simple()
    );
    let envelope = WebhookEnvelope::decode(&payload).unwrap();

    // Test-mode noise must not error, or the provider retries forever
    assert!(service.webhooks.handle_event(envelope).await.is_ok());
}

#[tokio::test]
#[ignore] // Requires database
async fn completion_without_correlation_applies_nothing() {
    let pool = test_pool().await;
    let service = service_with(pool.clone(), MockGateway::new());
    let user_id = insert_profile(&pool, None).await;

    let payload = format!(
        r#"{{
            "id": "evt_{}",
            "type": "checkout.session.completed",
            "data": {{
                "object": {{
                    "id": "cs_1",
                    "payment_intent": "pi_1",
                    "amount_total": 600,
                    "currency": "usd",
                    "metadata": {{}}
                }}
            }}
        }}"#,
        Uuid::new_v4().simple()
    );
    let envelope = WebhookEnvelope::decode(&payload).unwrap();

    assert!(service.webhooks.handle_event(envelope).await.is_err());

    let store = EntitlementStore::new(pool.clone());
    assert!(!store.has_premium(user_id).await.unwrap());
    assert!(store.payments_for_user(user_id, 10).await.unwrap().is_empty());
}

// ============================================================================
// Entitlement store invariants
// ============================================================================

#[tokio::test]
#[ignore] // Requires database
async fn customer_mapping_is_write_once() {
    let pool = test_pool().await;
    let store = EntitlementStore::new(pool.clone());
    let user_id = insert_profile(&pool, None).await;

    let first = store.attach_customer(user_id, "cus_first").await.unwrap();
    assert_eq!(first, "cus_first");

    // Second attach keeps the stored reference
    let second = store.attach_customer(user_id, "cus_second").await.unwrap();
    assert_eq!(second, "cus_first");

    assert_eq!(
        store.user_for_customer("cus_first").await.unwrap(),
        Some(user_id)
    );
    assert_eq!(store.user_for_customer("cus_second").await.unwrap(), None);
}

// ============================================================================
// Verification poller
// ============================================================================

#[tokio::test]
#[ignore] // Requires database
async fn poller_short_circuits_for_premium_user() {
    let pool = test_pool().await;
    let gateway = MockGateway::new();
    let service = service_with(pool.clone(), gateway.clone());
    let user_id = insert_profile(&pool, Some("cus_premium_sc")).await;

    let store = EntitlementStore::new(pool.clone());
    store.grant(user_id, None).await.unwrap();

    let outcome = service.verification.check(user_id).await.unwrap();
    assert!(outcome.has_premium);
    assert!(!outcome.recovered);
    assert_eq!(gateway.call_count(), 0, "premium check must not hit the provider");
}

#[tokio::test]
#[ignore] // Requires database
async fn poller_without_customer_returns_false() {
    let pool = test_pool().await;
    let gateway = MockGateway::new();
    let service = service_with(pool.clone(), gateway.clone());
    let user_id = insert_profile(&pool, None).await;

    let outcome = service.verification.check(user_id).await.unwrap();
    assert!(!outcome.has_premium);
    assert!(!outcome.recovered);
    assert_eq!(gateway.call_count(), 0);
}

#[tokio::test]
#[ignore] // Requires database
async fn poller_recovers_paid_session_and_writes_audit() {
    let pool = test_pool().await;
    let gateway = MockGateway::new().with_completed_session(SessionPaymentStatus::Paid);
    let service = service_with(pool.clone(), gateway.clone());
    let customer = format!("cus_{}", Uuid::new_v4().simple());
    let user_id = insert_profile(&pool, Some(&customer)).await;

    let outcome = service.verification.check(user_id).await.unwrap();
    assert!(outcome.has_premium);
    assert!(outcome.recovered, "recovery path must be reported distinctly");

    let store = EntitlementStore::new(pool.clone());
    assert!(store.has_premium(user_id).await.unwrap());
    assert_eq!(
        store.payments_for_user(user_id, 10).await.unwrap().len(),
        1,
        "recovery writes the audit row the webhook never did"
    );
}

#[tokio::test]
#[ignore] // Requires database
async fn poller_with_unpaid_sessions_mutates_nothing() {
    let pool = test_pool().await;
    let gateway = MockGateway::new().with_completed_session(SessionPaymentStatus::Unpaid);
    let service = service_with(pool.clone(), gateway.clone());
    let customer = format!("cus_{}", Uuid::new_v4().simple());
    let user_id = insert_profile(&pool, Some(&customer)).await;

    let outcome = service.verification.check(user_id).await.unwrap();
    assert!(!outcome.has_premium);
    assert!(!outcome.recovered);

    let store = EntitlementStore::new(pool.clone());
    assert!(!store.has_premium(user_id).await.unwrap());
}

// ============================================================================
// Paywall gate
// ============================================================================

#[tokio::test]
#[ignore] // Requires database
async fn free_user_at_limit_is_denied() {
    let pool = test_pool().await;
    let service = service_with(pool.clone(), MockGateway::new());
    let user_id = insert_profile(&pool, None).await;

    for _ in 0..9 {
        insert_application(&pool, user_id).await;
    }
    assert!(service.paywall.check(user_id).await.unwrap().is_allowed());

    insert_application(&pool, user_id).await;
    match service.paywall.check(user_id).await.unwrap() {
        PaywallDecision::LimitReached { count, limit } => {
            assert_eq!(count, 10);
            assert_eq!(limit, 10);
        }
        other => panic!("expected LimitReached, got {:?}", other),
    }
}

#[tokio::test]
#[ignore] // Requires database
async fn premium_user_is_never_capped() {
    let pool = test_pool().await;
    let service = service_with(pool.clone(), MockGateway::new());
    let user_id = insert_profile(&pool, None).await;

    let store = EntitlementStore::new(pool.clone());
    store.grant(user_id, None).await.unwrap();

    for _ in 0..12 {
        insert_application(&pool, user_id).await;
    }
    assert!(service.paywall.check(user_id).await.unwrap().is_allowed());
}
