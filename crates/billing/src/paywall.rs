//! Free-tier paywall gate
//!
//! Consulted before every application-creation request. Premium users pass
//! unconditionally; free users are capped at a fixed number of applications.
//! The count is recomputed on every check: a cached count would either
//! falsely reject or let users slide past the limit.

use sqlx::PgPool;
use uuid::Uuid;

use crate::entitlement::EntitlementStore;
use crate::error::BillingResult;

/// Applications a free-tier user may create
pub const FREE_APPLICATION_LIMIT: i64 = 10;

/// Outcome of a paywall check. Hitting the limit is a normal business
/// decision routed to an upsell prompt, not a system error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaywallDecision {
    Allowed,
    LimitReached { count: i64, limit: i64 },
}

impl PaywallDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed)
    }
}

/// Pure decision function: premium passes, free users pass below the limit.
///
/// The surrounding check-then-insert is not atomic with the subsequent
/// write; concurrent creates near the boundary can overshoot the cap by a
/// few rows. Accepted soft limit.
pub fn decide(has_premium: bool, application_count: i64) -> PaywallDecision {
    if has_premium {
        return PaywallDecision::Allowed;
    }
    if application_count < FREE_APPLICATION_LIMIT {
        PaywallDecision::Allowed
    } else {
        PaywallDecision::LimitReached {
            count: application_count,
            limit: FREE_APPLICATION_LIMIT,
        }
    }
}

/// Usage-counting guard in front of application creation
#[derive(Clone)]
pub struct PaywallGate {
    pool: PgPool,
    store: EntitlementStore,
}

impl PaywallGate {
    pub fn new(pool: PgPool) -> Self {
        Self {
            store: EntitlementStore::new(pool.clone()),
            pool,
        }
    }

    /// Decide whether the user may create another application
    pub async fn check(&self, user_id: Uuid) -> BillingResult<PaywallDecision> {
        if self.store.has_premium(user_id).await? {
            return Ok(PaywallDecision::Allowed);
        }

        let count = self.application_count(user_id).await?;
        let decision = decide(false, count);

        if let PaywallDecision::LimitReached { count, limit } = decision {
            tracing::info!(
                user_id = %user_id,
                count = count,
                limit = limit,
                "Free-tier application limit reached"
            );
        }

        Ok(decision)
    }

    /// Live count of the user's applications
    pub async fn application_count(&self, user_id: Uuid) -> BillingResult<i64> {
        let row: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM job_applications WHERE user_id = $1")
                .bind(user_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(row.0)
    }
}
