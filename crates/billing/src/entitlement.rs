//! Entitlement store
//!
//! Single home for every premium-entitlement transition. Handlers never flip
//! `has_premium` directly; they go through `grant` / `revoke` here so the
//! invariants hold in one place:
//!
//! - `has_premium = true` only after a completed payment was observed
//!   (webhook or poller), never speculatively.
//! - `stripe_customer_id` is write-once for the life of the account.
//! - Payment audit rows are append-only, deduplicated on the provider's
//!   payment reference.

use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::{BillingError, BillingResult};

/// Billing-relevant slice of a profile row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BillingProfile {
    pub user_id: Uuid,
    pub has_premium: bool,
    pub stripe_customer_id: Option<String>,
}

/// A completed payment observed via webhook or poller recovery
#[derive(Debug, Clone)]
pub struct PaymentAudit {
    /// Payment-intent or subscription reference; the dedup key
    pub stripe_payment_ref: String,
    pub amount_cents: i64,
    pub currency: String,
}

/// Append-only payment audit row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub stripe_payment_ref: String,
    pub amount_cents: i64,
    pub currency: String,
    pub status: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for PaymentRecord {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        use sqlx::Row;
        Ok(Self {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            stripe_payment_ref: row.try_get("stripe_payment_ref")?,
            amount_cents: row.try_get("amount_cents")?,
            currency: row.try_get("currency")?,
            status: row.try_get("status")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

/// Store for per-user entitlement state and the payment audit trail
#[derive(Clone)]
pub struct EntitlementStore {
    pool: PgPool,
}

impl EntitlementStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Load the billing slice of a user's profile
    pub async fn billing_profile(&self, user_id: Uuid) -> BillingResult<Option<BillingProfile>> {
        let row: Option<(bool, Option<String>)> = sqlx::query_as(
            "SELECT has_premium, stripe_customer_id FROM profiles WHERE id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(has_premium, stripe_customer_id)| BillingProfile {
            user_id,
            has_premium,
            stripe_customer_id,
        }))
    }

    pub async fn has_premium(&self, user_id: Uuid) -> BillingResult<bool> {
        Ok(self
            .billing_profile(user_id)
            .await?
            .map(|p| p.has_premium)
            .unwrap_or(false))
    }

    /// Grant premium to a user and append the payment audit row.
    ///
    /// Idempotent: re-granting an already-premium user is a no-op, and a
    /// payment reference that is already recorded appends nothing.
    pub async fn grant(&self, user_id: Uuid, payment: Option<&PaymentAudit>) -> BillingResult<()> {
        let updated = sqlx::query(
            "UPDATE profiles SET has_premium = TRUE, updated_at = NOW() WHERE id = $1",
        )
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        if updated.rows_affected() == 0 {
            return Err(BillingError::Database(format!(
                "no profile for user {}",
                user_id
            )));
        }

        if let Some(payment) = payment {
            self.record_payment(user_id, payment).await?;
        }

        tracing::info!(user_id = %user_id, "Premium access granted");
        Ok(())
    }

    /// Revoke premium. Idempotent; revoking an already-free user is a no-op.
    pub async fn revoke(&self, user_id: Uuid) -> BillingResult<()> {
        sqlx::query("UPDATE profiles SET has_premium = FALSE, updated_at = NOW() WHERE id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        tracing::info!(user_id = %user_id, "Premium access revoked");
        Ok(())
    }

    /// Persist the customer mapping created on first checkout attempt.
    ///
    /// The guarded UPDATE keeps the reference write-once: a second call for
    /// the same user leaves the original mapping untouched and reports it.
    pub async fn attach_customer(&self, user_id: Uuid, customer_id: &str) -> BillingResult<String> {
        let updated = sqlx::query(
            r#"
            UPDATE profiles
            SET stripe_customer_id = $1, updated_at = NOW()
            WHERE id = $2 AND stripe_customer_id IS NULL
            "#,
        )
        .bind(customer_id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        if updated.rows_affected() == 1 {
            return Ok(customer_id.to_string());
        }

        // A concurrent checkout attempt won the race; use the stored mapping.
        let existing: Option<(Option<String>,)> =
            sqlx::query_as("SELECT stripe_customer_id FROM profiles WHERE id = $1")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;

        match existing {
            Some((Some(stored),)) => {
                tracing::warn!(
                    user_id = %user_id,
                    stored_customer = %stored,
                    discarded_customer = %customer_id,
                    "Customer mapping already set, keeping stored reference"
                );
                Ok(stored)
            }
            _ => Err(BillingError::Database(format!(
                "no profile for user {}",
                user_id
            ))),
        }
    }

    /// Resolve a provider customer reference to the owning user, if any
    pub async fn user_for_customer(&self, customer_id: &str) -> BillingResult<Option<Uuid>> {
        let row: Option<(Uuid,)> =
            sqlx::query_as("SELECT id FROM profiles WHERE stripe_customer_id = $1")
                .bind(customer_id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.map(|(id,)| id))
    }

    /// Append a payment audit row; duplicate references are skipped
    async fn record_payment(&self, user_id: Uuid, payment: &PaymentAudit) -> BillingResult<()> {
        let inserted = sqlx::query(
            r#"
            INSERT INTO payments (id, user_id, stripe_payment_ref, amount_cents, currency, status)
            VALUES ($1, $2, $3, $4, $5, 'completed')
            ON CONFLICT (stripe_payment_ref) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(&payment.stripe_payment_ref)
        .bind(payment.amount_cents)
        .bind(&payment.currency)
        .execute(&self.pool)
        .await?;

        if inserted.rows_affected() == 0 {
            tracing::info!(
                user_id = %user_id,
                payment_ref = %payment.stripe_payment_ref,
                "Payment already recorded, skipping duplicate audit row"
            );
        }

        Ok(())
    }

    /// Payment history for a user, newest first
    pub async fn payments_for_user(
        &self,
        user_id: Uuid,
        limit: i64,
    ) -> BillingResult<Vec<PaymentRecord>> {
        let records: Vec<PaymentRecord> = sqlx::query_as(
            r#"
            SELECT id, user_id, stripe_payment_ref, amount_cents, currency, status, created_at
            FROM payments
            WHERE user_id = $1
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }
}
