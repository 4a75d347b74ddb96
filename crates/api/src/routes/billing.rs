//! Billing routes for Stripe integration

use axum::{
    extract::{Extension, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::{auth::AuthUser, error::ApiError, state::AppState};

/// Request to create a checkout session
#[derive(Debug, Default, Deserialize)]
pub struct CreateCheckoutRequest {
    pub locale: Option<String>,
    pub return_path: Option<String>,
}

/// Response from creating a checkout session
#[derive(Debug, Serialize)]
pub struct CheckoutResponse {
    pub session_id: String,
    pub url: Option<String>,
}

/// Request to create a portal session
#[derive(Debug, Default, Deserialize)]
pub struct PortalRequest {
    pub locale: Option<String>,
    pub return_path: Option<String>,
}

/// Response from creating a portal session
#[derive(Debug, Serialize)]
pub struct PortalResponse {
    pub url: String,
}

/// Response from the verification endpoint
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyResponse {
    pub has_premium: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recovered: Option<bool>,
}

/// Locale-prefixed in-app path: the default locale lives at the root, every
/// other locale under its own prefix.
fn localized_path(locale: Option<&str>, path: &str) -> String {
    match locale {
        Some(locale) if !locale.is_empty() && locale != "en" => format!("/{}{}", locale, path),
        _ => path.to_string(),
    }
}

/// Create a checkout session for the premium unlock
pub async fn create_checkout(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    body: Option<Json<CreateCheckoutRequest>>,
) -> Result<Json<CheckoutResponse>, ApiError> {
    let billing = state.billing.as_ref().ok_or(ApiError::ServiceUnavailable)?;
    let req = body.map(|Json(r)| r).unwrap_or_default();

    let email = auth_user.email.as_deref().unwrap_or("");
    let locale = req.locale.as_deref();
    let success_path = localized_path(locale, "/dashboard/payment-success");
    let cancel_path = localized_path(
        locale,
        req.return_path.as_deref().unwrap_or("/dashboard/applications"),
    );

    let session = billing
        .checkout
        .create_premium_checkout(auth_user.user_id, email, &success_path, &cancel_path)
        .await?;

    Ok(Json(CheckoutResponse {
        session_id: session.id,
        url: session.url,
    }))
}

/// Handle Stripe webhook events
///
/// The body must arrive unparsed: the signature covers the raw bytes.
pub async fn webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> Result<StatusCode, ApiError> {
    tracing::info!(body_len = body.len(), "Stripe webhook received");

    let billing = state.billing.as_ref().ok_or(ApiError::ServiceUnavailable)?;

    let signature = headers
        .get("stripe-signature")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| {
            tracing::warn!("Stripe webhook missing signature header");
            ApiError::BadRequest("Missing Stripe signature".to_string())
        })?;

    let envelope = billing
        .webhooks
        .verify_and_decode(&body, signature)
        .map_err(|e| {
            tracing::warn!(error = ?e, "Stripe webhook rejected");
            ApiError::from(e)
        })?;

    tracing::info!(
        event_type = %envelope.event_type,
        event_id = %envelope.event_id,
        "Stripe webhook event verified"
    );

    billing.webhooks.handle_event(envelope).await?;

    Ok(StatusCode::OK)
}

/// Re-derive entitlement from the provider when the webhook may not have
/// arrived yet. Called from the payment-success page.
pub async fn verify_premium(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
) -> Result<Json<VerifyResponse>, ApiError> {
    let billing = state.billing.as_ref().ok_or(ApiError::ServiceUnavailable)?;

    let outcome = billing.verification.check(auth_user.user_id).await?;

    Ok(Json(VerifyResponse {
        has_premium: outcome.has_premium,
        recovered: outcome.recovered.then_some(true),
    }))
}

/// Create a billing portal session for self-service management
pub async fn create_portal_session(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    body: Option<Json<PortalRequest>>,
) -> Result<Json<PortalResponse>, ApiError> {
    let billing = state.billing.as_ref().ok_or(ApiError::ServiceUnavailable)?;
    let req = body.map(|Json(r)| r).unwrap_or_default();

    let return_path = localized_path(
        req.locale.as_deref(),
        req.return_path.as_deref().unwrap_or("/dashboard/settings"),
    );
    let return_url = format!("{}{}", state.config.public_url, return_path);

    let url = billing
        .portal
        .create_portal_session(auth_user.user_id, &return_url)
        .await?;

    Ok(Json(PortalResponse { url }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_locale_has_no_prefix() {
        assert_eq!(localized_path(Some("en"), "/dashboard/settings"), "/dashboard/settings");
        assert_eq!(localized_path(None, "/dashboard/settings"), "/dashboard/settings");
    }

    #[test]
    fn test_other_locales_are_prefixed() {
        assert_eq!(
            localized_path(Some("ja"), "/dashboard/settings"),
            "/ja/dashboard/settings"
        );
    }

    #[test]
    fn test_verify_response_omits_recovered_when_absent() {
        let body = serde_json::to_string(&VerifyResponse {
            has_premium: false,
            recovered: None,
        })
        .unwrap();
        assert_eq!(body, r#"{"hasPremium":false}"#);

        let body = serde_json::to_string(&VerifyResponse {
            has_premium: true,
            recovered: Some(true),
        })
        .unwrap();
        assert_eq!(body, r#"{"hasPremium":true,"recovered":true}"#);
    }
}
