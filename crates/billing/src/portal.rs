//! Stripe Billing Portal

use std::sync::Arc;
use uuid::Uuid;

use crate::entitlement::EntitlementStore;
use crate::error::{BillingError, BillingResult};
use crate::gateway::PaymentGateway;

/// Portal service for hosted self-service management sessions.
/// Reads the entitlement store, never mutates it.
pub struct PortalService {
    gateway: Arc<dyn PaymentGateway>,
    store: EntitlementStore,
}

impl PortalService {
    pub fn new(gateway: Arc<dyn PaymentGateway>, store: EntitlementStore) -> Self {
        Self { gateway, store }
    }

    /// Create a portal session for a user's stored customer reference
    pub async fn create_portal_session(
        &self,
        user_id: Uuid,
        return_url: &str,
    ) -> BillingResult<String> {
        let profile = self
            .store
            .billing_profile(user_id)
            .await?
            .ok_or(BillingError::NoCustomer)?;

        let customer_id = profile.stripe_customer_id.ok_or(BillingError::NoCustomer)?;

        let url = self
            .gateway
            .create_portal_session(&customer_id, return_url)
            .await?;

        tracing::info!(
            user_id = %user_id,
            "Created billing portal session"
        );

        Ok(url)
    }
}
