//! Client-triggered entitlement verification
//!
//! Compensating reconciliation for webhooks that are delayed, dropped, or
//! not configured: re-derives entitlement from the provider's recent session
//! history when the user lands back in the app after checkout. Grant-only:
//! a small lookback window cannot prove a payment did not happen, so
//! revocation stays with the webhook reconciler.

use std::sync::Arc;
use uuid::Uuid;

use crate::entitlement::{EntitlementStore, PaymentAudit};
use crate::error::BillingResult;
use crate::gateway::{PaymentGateway, SessionPaymentStatus};

/// How many recent sessions the poller inspects. Completions lost beyond
/// this window are not auto-recovered; support escalation covers the residue.
pub const RECENT_SESSION_LOOKBACK: u64 = 5;

/// Result of a verification sweep
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerifyOutcome {
    pub has_premium: bool,
    /// True when this sweep found a paid session the webhook had not yet
    /// applied, so the caller can tell the user distinctly.
    pub recovered: bool,
}

/// Verification poller
pub struct VerificationService {
    gateway: Arc<dyn PaymentGateway>,
    store: EntitlementStore,
}

impl VerificationService {
    pub fn new(gateway: Arc<dyn PaymentGateway>, store: EntitlementStore) -> Self {
        Self { gateway, store }
    }

    /// Check the caller's entitlement, sweeping recent provider sessions if
    /// the local flag is not yet set.
    pub async fn check(&self, user_id: Uuid) -> BillingResult<VerifyOutcome> {
        let profile = self.store.billing_profile(user_id).await?;

        let Some(profile) = profile else {
            return Ok(VerifyOutcome {
                has_premium: false,
                recovered: false,
            });
        };

        // Short-circuit: already premium means zero provider calls
        if profile.has_premium {
            return Ok(VerifyOutcome {
                has_premium: true,
                recovered: false,
            });
        }

        // No checkout ever started, nothing to check
        let Some(customer_id) = profile.stripe_customer_id else {
            return Ok(VerifyOutcome {
                has_premium: false,
                recovered: false,
            });
        };

        let sessions = self
            .gateway
            .list_completed_sessions(&customer_id, RECENT_SESSION_LOOKBACK)
            .await?;

        let paid = sessions
            .into_iter()
            .find(|s| s.payment_status == SessionPaymentStatus::Paid);

        match paid {
            Some(session) => {
                // The webhook would have written this audit row; the recovery
                // path writes it itself so the flag never lacks a trail.
                let audit = session.payment_ref.as_ref().map(|r| PaymentAudit {
                    stripe_payment_ref: r.clone(),
                    amount_cents: session.amount_total.unwrap_or(0),
                    currency: session.currency.clone().unwrap_or_else(|| "usd".to_string()),
                });

                self.store.grant(user_id, audit.as_ref()).await?;

                tracing::info!(
                    user_id = %user_id,
                    session_id = %session.id,
                    "Entitlement recovered from session history"
                );

                Ok(VerifyOutcome {
                    has_premium: true,
                    recovered: true,
                })
            }
            None => Ok(VerifyOutcome {
                has_premium: false,
                recovered: false,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockGateway;

    // The short-circuit and grant paths need a profile row, so they live in
    // the DB integration tests. The gateway-facing contract is testable here.

    #[tokio::test]
    async fn test_lookback_is_bounded() {
        let mut gateway = MockGateway::new();
        for _ in 0..10 {
            gateway = gateway.with_completed_session(SessionPaymentStatus::Unpaid);
        }

        let sessions = gateway
            .list_completed_sessions("cus_test_1", RECENT_SESSION_LOOKBACK)
            .await
            .unwrap();
        assert_eq!(sessions.len(), RECENT_SESSION_LOOKBACK as usize);
    }

    #[tokio::test]
    async fn test_paid_session_found_in_window() {
        let gateway = MockGateway::new()
            .with_completed_session(SessionPaymentStatus::Unpaid)
            .with_completed_session(SessionPaymentStatus::Paid);

        let sessions = gateway
            .list_completed_sessions("cus_test_1", RECENT_SESSION_LOOKBACK)
            .await
            .unwrap();
        let paid = sessions
            .iter()
            .find(|s| s.payment_status == SessionPaymentStatus::Paid);
        assert!(paid.is_some());
        assert!(paid.and_then(|s| s.payment_ref.as_deref()).is_some());
    }
}
