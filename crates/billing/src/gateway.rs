//! Payment gateway seam
//!
//! Business logic talks to Stripe through this trait so the checkout,
//! verification, and portal services never touch `stripe::*` types directly,
//! and tests can substitute a mock without network access.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::BillingResult;

/// Payment state of a checkout session as reported by the provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPaymentStatus {
    Paid,
    Unpaid,
    NoPaymentRequired,
}

/// Request to open a hosted checkout flow for the premium unlock
#[derive(Debug, Clone)]
pub struct CreateCheckoutRequest {
    pub customer_id: String,
    /// Correlation key embedded in session metadata. The webhook reconciler
    /// trusts only this field to map the event back to a user.
    pub user_id: Uuid,
    pub amount_cents: i64,
    pub product_name: String,
    pub product_description: String,
    pub success_url: String,
    pub cancel_url: String,
}

/// Minimal view of a checkout session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutSessionInfo {
    pub id: String,
    pub url: Option<String>,
    pub payment_status: SessionPaymentStatus,
    /// Payment-intent or subscription reference, used as the payment audit
    /// dedup key once the session completes.
    pub payment_ref: Option<String>,
    pub amount_total: Option<i64>,
    pub currency: Option<String>,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Create a provider-side customer tagged with the internal user id.
    /// Returns the opaque customer reference.
    async fn create_customer(&self, email: &str, user_id: Uuid) -> BillingResult<String>;

    async fn create_checkout_session(
        &self,
        req: CreateCheckoutRequest,
    ) -> BillingResult<CheckoutSessionInfo>;

    /// List the most recent *completed* sessions for a customer, newest
    /// first, bounded by `limit`. Used by the verification poller only.
    async fn list_completed_sessions(
        &self,
        customer_id: &str,
        limit: u64,
    ) -> BillingResult<Vec<CheckoutSessionInfo>>;

    /// Open a hosted self-service management session and return its URL.
    async fn create_portal_session(
        &self,
        customer_id: &str,
        return_url: &str,
    ) -> BillingResult<String>;
}
