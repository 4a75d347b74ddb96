//! Stripe webhook handling
//!
//! The authoritative path for entitlement changes. Incoming payloads are
//! signature-verified against the raw body, decoded into a closed set of
//! event variants, then applied idempotently: the provider may deliver the
//! same event more than once, and re-application must be a no-op.

use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use sqlx::PgPool;
use uuid::Uuid;

use crate::entitlement::{EntitlementStore, PaymentAudit};
use crate::error::{BillingError, BillingResult};

type HmacSha256 = Hmac<Sha256>;

/// Maximum age of a signed payload before it is rejected as a replay
pub const SIGNATURE_TOLERANCE_SECS: i64 = 300;

/// Verify a Stripe `v1` webhook signature against the raw request body.
///
/// Manual verification: async-stripe's bundled verifier rejects payloads from
/// newer Stripe API versions than the one it was generated for. The header
/// format is `t=<unix>,v1=<hex hmac>[,v0=...]` and the signed payload is
/// `<t>.<body>`.
pub fn verify_signature(payload: &str, signature: &str, secret: &str) -> BillingResult<()> {
    let mut timestamp: Option<i64> = None;
    let mut v1_signature: Option<String> = None;

    for part in signature.split(',') {
        let kv: Vec<&str> = part.splitn(2, '=').collect();
        if kv.len() == 2 {
            match kv[0] {
                "t" => timestamp = kv[1].parse().ok(),
                "v1" => v1_signature = Some(kv[1].to_string()),
                _ => {}
            }
        }
    }

    let timestamp = timestamp.ok_or_else(|| {
        tracing::warn!("Missing timestamp in signature header");
        BillingError::InvalidSignature
    })?;

    let v1_signature = v1_signature.ok_or_else(|| {
        tracing::warn!("Missing v1 signature in signature header");
        BillingError::InvalidSignature
    })?;

    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map_err(|_| BillingError::InvalidSignature)?
        .as_secs() as i64;

    if (now - timestamp).abs() > SIGNATURE_TOLERANCE_SECS {
        tracing::warn!(
            timestamp = timestamp,
            now = now,
            "Webhook timestamp outside tolerance"
        );
        return Err(BillingError::InvalidSignature);
    }

    // The secret's "whsec_" prefix is not part of the key material
    let secret_key = secret.strip_prefix("whsec_").unwrap_or(secret);
    let signed_payload = format!("{}.{}", timestamp, payload);

    let mut mac = HmacSha256::new_from_slice(secret_key.as_bytes())
        .map_err(|_| BillingError::InvalidSignature)?;
    mac.update(signed_payload.as_bytes());
    let computed = hex::encode(mac.finalize().into_bytes());

    if computed != v1_signature {
        tracing::warn!("Webhook signature mismatch");
        return Err(BillingError::InvalidSignature);
    }

    Ok(())
}

// =============================================================================
// Event decoding
// =============================================================================

/// Closed set of webhook events the reconciler acts on. Anything the
/// application does not handle lands in `Other` and is acknowledged without
/// state change, rather than falling through string comparisons downstream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookEvent {
    CheckoutCompleted(CompletedCheckout),
    SubscriptionCanceled { customer: String },
    PaymentFailed { customer: String },
    Other { event_type: String },
}

/// Fields extracted from a `checkout.session.completed` payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedCheckout {
    /// Correlation key from session metadata; `None` means the event cannot
    /// be mapped to a user and must not be applied.
    pub user_id: Option<Uuid>,
    /// Payment-intent or subscription reference for the payment audit
    pub payment_ref: Option<String>,
    pub amount_cents: i64,
    pub currency: String,
}

/// A verified, decoded webhook delivery
#[derive(Debug, Clone)]
pub struct WebhookEnvelope {
    pub event_id: String,
    pub event_type: String,
    pub event: WebhookEvent,
}

#[derive(Debug, Deserialize)]
struct RawEnvelope {
    id: String,
    #[serde(rename = "type")]
    event_type: String,
    data: RawEventData,
}

#[derive(Debug, Deserialize)]
struct RawEventData {
    object: serde_json::Value,
}

/// An object reference that may arrive as a bare id or an expanded object
fn expandable_id(value: Option<&serde_json::Value>) -> Option<String> {
    match value {
        Some(serde_json::Value::String(id)) => Some(id.clone()),
        Some(serde_json::Value::Object(obj)) => obj
            .get("id")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string()),
        _ => None,
    }
}

impl WebhookEnvelope {
    /// Decode a verified raw payload into the closed event set.
    ///
    /// Decoding never fails on unknown event types; it fails only when the
    /// payload is not a Stripe event envelope at all.
    pub fn decode(payload: &str) -> BillingResult<Self> {
        let raw: RawEnvelope = serde_json::from_str(payload)
            .map_err(|e| BillingError::MalformedPayload(e.to_string()))?;

        let object = &raw.data.object;
        let event = match raw.event_type.as_str() {
            "checkout.session.completed" => {
                let user_id = object
                    .get("metadata")
                    .and_then(|m| m.get("user_id"))
                    .and_then(|v| v.as_str())
                    .and_then(|s| Uuid::parse_str(s).ok());
                let payment_ref = expandable_id(object.get("payment_intent"))
                    .or_else(|| expandable_id(object.get("subscription")));
                let amount_cents = object
                    .get("amount_total")
                    .and_then(|v| v.as_i64())
                    .unwrap_or(0);
                let currency = object
                    .get("currency")
                    .and_then(|v| v.as_str())
                    .unwrap_or("usd")
                    .to_string();

                WebhookEvent::CheckoutCompleted(CompletedCheckout {
                    user_id,
                    payment_ref,
                    amount_cents,
                    currency,
                })
            }
            "customer.subscription.deleted" => match expandable_id(object.get("customer")) {
                Some(customer) => WebhookEvent::SubscriptionCanceled { customer },
                None => {
                    return Err(BillingError::MalformedPayload(
                        "subscription event without customer".to_string(),
                    ))
                }
            },
            "invoice.payment_failed" => match expandable_id(object.get("customer")) {
                Some(customer) => WebhookEvent::PaymentFailed { customer },
                None => {
                    return Err(BillingError::MalformedPayload(
                        "invoice event without customer".to_string(),
                    ))
                }
            },
            other => WebhookEvent::Other {
                event_type: other.to_string(),
            },
        };

        Ok(Self {
            event_id: raw.id,
            event_type: raw.event_type,
            event,
        })
    }
}

// =============================================================================
// Handler
// =============================================================================

/// Webhook handler for Stripe events
pub struct WebhookHandler {
    pool: PgPool,
    store: EntitlementStore,
    webhook_secret: String,
}

impl WebhookHandler {
    pub fn new(pool: PgPool, webhook_secret: String) -> Self {
        Self {
            store: EntitlementStore::new(pool.clone()),
            pool,
            webhook_secret,
        }
    }

    /// Verify the signature against the raw body and decode the payload.
    /// Unsigned or mis-signed payloads fail closed; nothing in an unverified
    /// payload is ever trusted.
    pub fn verify_and_decode(
        &self,
        payload: &str,
        signature: &str,
    ) -> BillingResult<WebhookEnvelope> {
        verify_signature(payload, signature, &self.webhook_secret)?;
        WebhookEnvelope::decode(payload)
    }

    /// Apply a verified event. Duplicate deliveries are recognized via the
    /// event ledger and acknowledged without re-application.
    pub async fn handle_event(&self, envelope: WebhookEnvelope) -> BillingResult<()> {
        // Atomic claim: only the first delivery of an event id gets a row
        // back and processes it. A row left in 'error' by a transient
        // failure is re-claimable, so the provider's retry can recover it;
        // a successful row is not, which makes redelivery a no-op.
        let claimed: Option<(Uuid,)> = sqlx::query_as(
            r#"
            INSERT INTO stripe_webhook_events (id, stripe_event_id, event_type, processing_result)
            VALUES ($1, $2, $3, 'processing')
            ON CONFLICT (stripe_event_id) DO UPDATE SET
                processing_result = 'processing',
                error_message = NULL
            WHERE stripe_webhook_events.processing_result = 'error'
            RETURNING id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&envelope.event_id)
        .bind(&envelope.event_type)
        .fetch_optional(&self.pool)
        .await?;

        if claimed.is_none() {
            tracing::info!(
                event_id = %envelope.event_id,
                event_type = %envelope.event_type,
                "Duplicate webhook delivery, acknowledging without re-application"
            );
            return Ok(());
        }

        tracing::info!(
            event_id = %envelope.event_id,
            event_type = %envelope.event_type,
            "Processing Stripe webhook event"
        );

        let result = self.apply(&envelope.event).await;

        let (processing_result, error_message) = match &result {
            Ok(()) => ("success", None),
            Err(e) => ("error", Some(e.to_string())),
        };

        if let Err(e) = sqlx::query(
            r#"
            UPDATE stripe_webhook_events
            SET processing_result = $1, error_message = $2
            WHERE stripe_event_id = $3
            "#,
        )
        .bind(processing_result)
        .bind(&error_message)
        .bind(&envelope.event_id)
        .execute(&self.pool)
        .await
        {
            tracing::error!(
                event_id = %envelope.event_id,
                error = %e,
                "Failed to record webhook processing result"
            );
        }

        result
    }

    /// The transition table. Each arm is idempotent on its own, so replays
    /// that slip past the ledger still converge to the same state.
    async fn apply(&self, event: &WebhookEvent) -> BillingResult<()> {
        match event {
            WebhookEvent::CheckoutCompleted(completed) => {
                let user_id = match completed.user_id {
                    Some(id) => id,
                    None => {
                        // Never guess an identity: leaving entitlement unset
                        // beats granting it to the wrong account.
                        tracing::error!("Completion event missing user_id metadata");
                        return Err(BillingError::MissingCorrelation);
                    }
                };

                let audit = completed.payment_ref.as_ref().map(|r| PaymentAudit {
                    stripe_payment_ref: r.clone(),
                    amount_cents: completed.amount_cents,
                    currency: completed.currency.clone(),
                });
                if audit.is_none() {
                    tracing::warn!(
                        user_id = %user_id,
                        "Completed session carries no payment reference, granting without audit row"
                    );
                }

                self.store.grant(user_id, audit.as_ref()).await
            }
            WebhookEvent::SubscriptionCanceled { customer } => {
                self.revoke_for_customer(customer, "subscription deleted")
                    .await
            }
            WebhookEvent::PaymentFailed { customer } => {
                self.revoke_for_customer(customer, "payment failed").await
            }
            WebhookEvent::Other { event_type } => {
                tracing::debug!(event_type = %event_type, "Ignoring unhandled event type");
                Ok(())
            }
        }
    }

    async fn revoke_for_customer(&self, customer: &str, reason: &str) -> BillingResult<()> {
        match self.store.user_for_customer(customer).await? {
            Some(user_id) => {
                self.store.revoke(user_id).await?;
                tracing::info!(user_id = %user_id, reason = %reason, "Premium revoked");
                Ok(())
            }
            None => {
                // Possibly test-mode noise or an event for another
                // environment; acknowledge so the provider stops retrying.
                tracing::info!(
                    customer = %customer,
                    reason = %reason,
                    "Revocation event for unknown customer, acknowledging"
                );
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_test_secret_key";

    fn now_ts() -> i64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_secs() as i64
    }

    fn sign(payload: &str, secret: &str, timestamp: i64) -> String {
        let key = secret.strip_prefix("whsec_").unwrap_or(secret);
        let mut mac = HmacSha256::new_from_slice(key.as_bytes()).unwrap();
        mac.update(format!("{}.{}", timestamp, payload).as_bytes());
        let sig = hex::encode(mac.finalize().into_bytes());
        format!("t={},v1={}", timestamp, sig)
    }

    #[test]
    fn test_valid_signature_passes() {
        let payload = r#"{"id":"evt_1","type":"customer.updated"}"#;
        let header = sign(payload, SECRET, now_ts());
        assert!(verify_signature(payload, &header, SECRET).is_ok());
    }

    #[test]
    fn test_tampered_payload_fails() {
        let payload = r#"{"id":"evt_1","type":"customer.updated"}"#;
        let header = sign(payload, SECRET, now_ts());
        let tampered = payload.replace("evt_1", "evt_2");
        assert!(matches!(
            verify_signature(&tampered, &header, SECRET),
            Err(BillingError::InvalidSignature)
        ));
    }

    #[test]
    fn test_wrong_secret_fails() {
        let payload = r#"{"id":"evt_1","type":"customer.updated"}"#;
        let header = sign(payload, "whsec_other_secret", now_ts());
        assert!(matches!(
            verify_signature(payload, &header, SECRET),
            Err(BillingError::InvalidSignature)
        ));
    }

    #[test]
    fn test_stale_timestamp_fails() {
        let payload = r#"{"id":"evt_1","type":"customer.updated"}"#;
        let header = sign(payload, SECRET, now_ts() - SIGNATURE_TOLERANCE_SECS - 10);
        assert!(matches!(
            verify_signature(payload, &header, SECRET),
            Err(BillingError::InvalidSignature)
        ));
    }

    #[test]
    fn test_header_without_v1_fails() {
        let payload = r#"{"id":"evt_1","type":"customer.updated"}"#;
        let header = format!("t={}", now_ts());
        assert!(matches!(
            verify_signature(payload, &header, SECRET),
            Err(BillingError::InvalidSignature)
        ));
    }

    #[test]
    fn test_decode_checkout_completed() {
        let payload = r#"{
            "id": "evt_100",
            "type": "checkout.session.completed",
            "data": {
                "object": {
                    "id": "cs_1",
                    "payment_intent": "pi_123",
                    "amount_total": 600,
                    "currency": "usd",
                    "metadata": { "user_id": "7f1b6a44-9a58-4be6-b343-9e42cbbfa2a3" }
                }
            }
        }"#;

        let envelope = WebhookEnvelope::decode(payload).unwrap();
        assert_eq!(envelope.event_id, "evt_100");
        match envelope.event {
            WebhookEvent::CheckoutCompleted(completed) => {
                assert_eq!(
                    completed.user_id,
                    Some(Uuid::parse_str("7f1b6a44-9a58-4be6-b343-9e42cbbfa2a3").unwrap())
                );
                assert_eq!(completed.payment_ref.as_deref(), Some("pi_123"));
                assert_eq!(completed.amount_cents, 600);
                assert_eq!(completed.currency, "usd");
            }
            other => panic!("expected CheckoutCompleted, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_completed_without_user_id() {
        // Correlation stripped: decode succeeds, but user_id is None so the
        // handler refuses to apply it.
        let payload = r#"{
            "id": "evt_101",
            "type": "checkout.session.completed",
            "data": {
                "object": {
                    "id": "cs_1",
                    "payment_intent": "pi_123",
                    "amount_total": 600,
                    "currency": "usd",
                    "metadata": {}
                }
            }
        }"#;

        let envelope = WebhookEnvelope::decode(payload).unwrap();
        match envelope.event {
            WebhookEvent::CheckoutCompleted(completed) => assert_eq!(completed.user_id, None),
            other => panic!("expected CheckoutCompleted, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_subscription_deleted_with_expanded_customer() {
        let payload = r#"{
            "id": "evt_102",
            "type": "customer.subscription.deleted",
            "data": { "object": { "id": "sub_1", "customer": { "id": "cus_9" } } }
        }"#;

        let envelope = WebhookEnvelope::decode(payload).unwrap();
        assert_eq!(
            envelope.event,
            WebhookEvent::SubscriptionCanceled {
                customer: "cus_9".to_string()
            }
        );
    }

    #[test]
    fn test_decode_payment_failed() {
        let payload = r#"{
            "id": "evt_103",
            "type": "invoice.payment_failed",
            "data": { "object": { "id": "in_1", "customer": "cus_9" } }
        }"#;

        let envelope = WebhookEnvelope::decode(payload).unwrap();
        assert_eq!(
            envelope.event,
            WebhookEvent::PaymentFailed {
                customer: "cus_9".to_string()
            }
        );
    }

    #[test]
    fn test_decode_unknown_event_type() {
        let payload = r#"{
            "id": "evt_104",
            "type": "charge.refunded",
            "data": { "object": { "id": "ch_1" } }
        }"#;

        let envelope = WebhookEnvelope::decode(payload).unwrap();
        assert_eq!(
            envelope.event,
            WebhookEvent::Other {
                event_type: "charge.refunded".to_string()
            }
        );
    }

    #[test]
    fn test_decode_rejects_non_event_json() {
        assert!(matches!(
            WebhookEnvelope::decode("{\"not\": \"an event\"}"),
            Err(BillingError::MalformedPayload(_))
        ));
        assert!(matches!(
            WebhookEnvelope::decode("not json at all"),
            Err(BillingError::MalformedPayload(_))
        ));
    }
}
