//! Billing error types

use thiserror::Error;

/// Billing-specific errors
#[derive(Debug, Error)]
pub enum BillingError {
    #[error("User already has premium access")]
    AlreadyEntitled,

    #[error("Payment provider unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("Webhook signature verification failed")]
    InvalidSignature,

    #[error("Completion event carries no user correlation")]
    MissingCorrelation,

    #[error("No Stripe customer exists for this user")]
    NoCustomer,

    #[error("Customer not found: {0}")]
    CustomerNotFound(String),

    #[error("Malformed webhook payload: {0}")]
    MalformedPayload(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<stripe::StripeError> for BillingError {
    fn from(err: stripe::StripeError) -> Self {
        BillingError::ProviderUnavailable(err.to_string())
    }
}

impl From<sqlx::Error> for BillingError {
    fn from(err: sqlx::Error) -> Self {
        BillingError::Database(err.to_string())
    }
}

pub type BillingResult<T> = Result<T, BillingError>;
