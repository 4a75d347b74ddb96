//! API error types and handling

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use jobtrail_billing::BillingError;
use serde_json::json;

/// Application error type
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    // Authentication errors
    #[error("Authentication required")]
    Unauthorized,
    #[error("Invalid or expired token")]
    InvalidToken,

    // Validation errors
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Invalid request: {0}")]
    BadRequest(String),

    // Resource errors
    #[error("Resource not found")]
    NotFound,
    #[error("Resource already exists")]
    Conflict(String),

    // Billing errors
    #[error("Free application limit reached")]
    LimitReached,
    #[error("You already have premium access")]
    AlreadyEntitled,
    #[error("No billing account found")]
    NoCustomer,
    #[error("Payment provider unavailable")]
    ProviderUnavailable,

    // Internal errors
    #[error("Database error: {0}")]
    Database(String),
    #[error("Internal server error")]
    Internal,
    #[error("Service unavailable")]
    ServiceUnavailable,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            // Authentication
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", self.to_string()),
            ApiError::InvalidToken => (StatusCode::UNAUTHORIZED, "INVALID_TOKEN", self.to_string()),

            // Validation
            ApiError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),

            // Resources
            ApiError::NotFound => (StatusCode::NOT_FOUND, "NOT_FOUND", self.to_string()),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),

            // Billing. The limit is an upsell signal, not a failure; clients
            // route LIMIT_REACHED to the paywall dialog.
            ApiError::LimitReached => (StatusCode::PAYMENT_REQUIRED, "LIMIT_REACHED", self.to_string()),
            ApiError::AlreadyEntitled => (StatusCode::BAD_REQUEST, "ALREADY_ENTITLED", self.to_string()),
            ApiError::NoCustomer => (StatusCode::BAD_REQUEST, "NO_CUSTOMER", self.to_string()),
            ApiError::ProviderUnavailable => (StatusCode::BAD_GATEWAY, "PROVIDER_UNAVAILABLE", self.to_string()),

            // Internal
            ApiError::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, "DATABASE_ERROR", "Database error".to_string()),
            ApiError::Internal => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", self.to_string()),
            ApiError::ServiceUnavailable => (StatusCode::SERVICE_UNAVAILABLE, "SERVICE_UNAVAILABLE", self.to_string()),
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        tracing::error!("Database error: {:?}", err);
        match err {
            sqlx::Error::RowNotFound => ApiError::NotFound,
            sqlx::Error::Database(db_err) => {
                if let Some(code) = db_err.code() {
                    // PostgreSQL unique violation
                    if code == "23505" {
                        return ApiError::Conflict("Resource already exists".to_string());
                    }
                }
                ApiError::Database(db_err.to_string())
            }
            _ => ApiError::Database(err.to_string()),
        }
    }
}

impl From<BillingError> for ApiError {
    fn from(err: BillingError) -> Self {
        match err {
            BillingError::AlreadyEntitled => ApiError::AlreadyEntitled,
            BillingError::NoCustomer => ApiError::NoCustomer,
            // Fail closed: nothing from an unverified or uncorrelatable
            // payload is applied, and the provider must not retry it.
            BillingError::InvalidSignature => {
                ApiError::BadRequest("Invalid webhook signature".to_string())
            }
            BillingError::MissingCorrelation => {
                ApiError::BadRequest("Event carries no user correlation".to_string())
            }
            BillingError::MalformedPayload(msg) => ApiError::BadRequest(msg),
            // Transient: surface as retryable to the caller (or to Stripe's
            // webhook retry schedule).
            BillingError::ProviderUnavailable(msg) => {
                tracing::error!(error = %msg, "Payment provider unavailable");
                ApiError::ProviderUnavailable
            }
            BillingError::Database(msg) => ApiError::Database(msg),
            BillingError::CustomerNotFound(msg) => {
                tracing::warn!(error = %msg, "Customer lookup failed");
                ApiError::NotFound
            }
            BillingError::Config(msg) => {
                tracing::error!(error = %msg, "Billing misconfigured");
                ApiError::ServiceUnavailable
            }
        }
    }
}

/// Result type alias for API handlers
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn status_of(err: ApiError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn test_limit_reached_maps_to_payment_required() {
        assert_eq!(status_of(ApiError::LimitReached), StatusCode::PAYMENT_REQUIRED);
    }

    #[test]
    fn test_signature_failures_are_terminal_400s() {
        assert_eq!(
            status_of(BillingError::InvalidSignature.into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(BillingError::MissingCorrelation.into()),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_transient_failures_are_retryable_statuses() {
        // 5xx tells Stripe's retry schedule to redeliver
        assert_eq!(
            status_of(BillingError::Database("down".to_string()).into()),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            status_of(BillingError::ProviderUnavailable("down".to_string()).into()),
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn test_already_entitled_is_client_error() {
        assert_eq!(
            status_of(BillingError::AlreadyEntitled.into()),
            StatusCode::BAD_REQUEST
        );
    }
}
