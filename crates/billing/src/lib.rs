// Test code patterns (expected in test files):
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! JobTrail Billing Module
//!
//! Handles the premium-entitlement subsystem: Stripe checkout, webhook
//! reconciliation, client-triggered verification, and the free-tier paywall.
//!
//! ## Components
//!
//! - **Checkout**: opens the hosted one-time premium purchase flow
//! - **Webhooks**: the authoritative entitlement state machine (signature
//!   verification, closed-set event decode, idempotent application)
//! - **Verification**: compensating poller for lost or delayed webhooks
//! - **Paywall**: usage-counting gate in front of application creation
//! - **Portal**: hosted self-service subscription management

pub mod checkout;
pub mod client;
pub mod entitlement;
pub mod error;
pub mod gateway;
pub mod mock;
pub mod paywall;
pub mod portal;
pub mod verify;
pub mod webhooks;

pub use checkout::CheckoutService;
pub use client::{LiveGateway, StripeConfig};
pub use entitlement::{BillingProfile, EntitlementStore, PaymentAudit, PaymentRecord};
pub use error::{BillingError, BillingResult};
pub use gateway::{
    CheckoutSessionInfo, CreateCheckoutRequest, PaymentGateway, SessionPaymentStatus,
};
pub use paywall::{PaywallDecision, PaywallGate, FREE_APPLICATION_LIMIT};
pub use portal::PortalService;
pub use verify::{VerificationService, VerifyOutcome, RECENT_SESSION_LOOKBACK};
pub use webhooks::{
    verify_signature, CompletedCheckout, WebhookEnvelope, WebhookEvent, WebhookHandler,
};

use sqlx::PgPool;
use std::sync::Arc;

/// Main billing service that combines all billing functionality
pub struct BillingService {
    pub checkout: CheckoutService,
    pub entitlement: EntitlementStore,
    pub paywall: PaywallGate,
    pub portal: PortalService,
    pub verification: VerificationService,
    pub webhooks: WebhookHandler,
}

impl BillingService {
    /// Create a billing service from explicit config and a gateway
    pub fn new(config: StripeConfig, pool: PgPool, gateway: Arc<dyn PaymentGateway>) -> Self {
        let store = EntitlementStore::new(pool.clone());

        Self {
            checkout: CheckoutService::new(gateway.clone(), store.clone(), &config),
            entitlement: store.clone(),
            paywall: PaywallGate::new(pool.clone()),
            portal: PortalService::new(gateway.clone(), store.clone()),
            verification: VerificationService::new(gateway, store),
            webhooks: WebhookHandler::new(pool, config.webhook_secret.clone()),
        }
    }

    /// Create a billing service from environment variables with the live
    /// Stripe gateway
    pub fn from_env(pool: PgPool) -> BillingResult<Self> {
        let config = StripeConfig::from_env()?;
        let gateway = Arc::new(LiveGateway::new(&config));
        Ok(Self::new(config, pool, gateway))
    }
}
