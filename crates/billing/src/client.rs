//! Stripe client configuration and the live gateway

use async_trait::async_trait;
use stripe::{
    BillingPortalSession, CheckoutSession, CheckoutSessionMode, CreateBillingPortalSession,
    CreateCheckoutSession, CreateCheckoutSessionLineItems, CreateCheckoutSessionLineItemsPriceData,
    CreateCheckoutSessionLineItemsPriceDataProductData, CreateCustomer, Customer, CustomerId,
    ListCheckoutSessions,
};
use uuid::Uuid;

use crate::error::{BillingError, BillingResult};
use crate::gateway::{
    CheckoutSessionInfo, CreateCheckoutRequest, PaymentGateway, SessionPaymentStatus,
};

/// Configuration for Stripe billing
#[derive(Debug, Clone)]
pub struct StripeConfig {
    /// Stripe secret API key
    pub secret_key: String,
    /// Stripe webhook signing secret
    pub webhook_secret: String,
    /// One-time premium unlock price in cents
    pub premium_price_cents: i64,
    /// Base URL for success/cancel redirects
    pub app_base_url: String,
}

impl StripeConfig {
    /// Create config from environment variables
    pub fn from_env() -> BillingResult<Self> {
        Ok(Self {
            secret_key: std::env::var("STRIPE_SECRET_KEY")
                .map_err(|_| BillingError::Config("STRIPE_SECRET_KEY not set".to_string()))?,
            webhook_secret: std::env::var("STRIPE_WEBHOOK_SECRET")
                .map_err(|_| BillingError::Config("STRIPE_WEBHOOK_SECRET not set".to_string()))?,
            premium_price_cents: std::env::var("PREMIUM_PRICE_CENTS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(600),
            app_base_url: std::env::var("APP_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),
        })
    }
}

/// Live Stripe-backed gateway
#[derive(Clone)]
pub struct LiveGateway {
    client: stripe::Client,
}

impl LiveGateway {
    pub fn new(config: &StripeConfig) -> Self {
        Self {
            client: stripe::Client::new(&config.secret_key),
        }
    }

    fn parse_customer_id(customer_id: &str) -> BillingResult<CustomerId> {
        customer_id
            .parse::<CustomerId>()
            .map_err(|e| BillingError::CustomerNotFound(format!("{}: {}", customer_id, e)))
    }
}

fn map_payment_status(status: stripe::CheckoutSessionPaymentStatus) -> SessionPaymentStatus {
    match status {
        stripe::CheckoutSessionPaymentStatus::Paid => SessionPaymentStatus::Paid,
        stripe::CheckoutSessionPaymentStatus::Unpaid => SessionPaymentStatus::Unpaid,
        stripe::CheckoutSessionPaymentStatus::NoPaymentRequired => {
            SessionPaymentStatus::NoPaymentRequired
        }
    }
}

fn session_info(session: CheckoutSession) -> CheckoutSessionInfo {
    // Payment-intent reference for one-time payments, subscription reference
    // otherwise. Either works as the audit dedup key.
    let payment_ref = session
        .payment_intent
        .as_ref()
        .map(|pi| pi.id().to_string())
        .or_else(|| session.subscription.as_ref().map(|s| s.id().to_string()));

    CheckoutSessionInfo {
        id: session.id.to_string(),
        url: session.url.clone(),
        payment_status: map_payment_status(session.payment_status),
        payment_ref,
        amount_total: session.amount_total,
        currency: session.currency.map(|c| c.to_string()),
    }
}

#[async_trait]
impl PaymentGateway for LiveGateway {
    async fn create_customer(&self, email: &str, user_id: Uuid) -> BillingResult<String> {
        let mut metadata = std::collections::HashMap::new();
        metadata.insert("user_id".to_string(), user_id.to_string());
        metadata.insert("platform".to_string(), "jobtrail".to_string());

        let params = CreateCustomer {
            email: Some(email),
            metadata: Some(metadata),
            ..Default::default()
        };

        let customer = Customer::create(&self.client, params).await?;

        tracing::info!(
            user_id = %user_id,
            customer_id = %customer.id,
            "Created Stripe customer"
        );

        Ok(customer.id.to_string())
    }

    async fn create_checkout_session(
        &self,
        req: CreateCheckoutRequest,
    ) -> BillingResult<CheckoutSessionInfo> {
        let customer_id = Self::parse_customer_id(&req.customer_id)?;

        let mut metadata = std::collections::HashMap::new();
        metadata.insert("user_id".to_string(), req.user_id.to_string());

        let line_item = CreateCheckoutSessionLineItems {
            price_data: Some(CreateCheckoutSessionLineItemsPriceData {
                currency: stripe::Currency::USD,
                unit_amount: Some(req.amount_cents),
                product_data: Some(CreateCheckoutSessionLineItemsPriceDataProductData {
                    name: req.product_name.clone(),
                    description: Some(req.product_description.clone()),
                    ..Default::default()
                }),
                ..Default::default()
            }),
            quantity: Some(1),
            ..Default::default()
        };

        let params = CreateCheckoutSession {
            customer: Some(customer_id),
            mode: Some(CheckoutSessionMode::Payment),
            line_items: Some(vec![line_item]),
            success_url: Some(&req.success_url),
            cancel_url: Some(&req.cancel_url),
            metadata: Some(metadata),
            ..Default::default()
        };

        let session = CheckoutSession::create(&self.client, params).await?;

        tracing::info!(
            user_id = %req.user_id,
            session_id = %session.id,
            amount_cents = req.amount_cents,
            "Created premium checkout session"
        );

        Ok(session_info(session))
    }

    async fn list_completed_sessions(
        &self,
        customer_id: &str,
        limit: u64,
    ) -> BillingResult<Vec<CheckoutSessionInfo>> {
        let customer_id = Self::parse_customer_id(customer_id)?;

        let params = ListCheckoutSessions {
            customer: Some(customer_id),
            limit: Some(limit),
            ..Default::default()
        };

        let sessions = CheckoutSession::list(&self.client, &params).await?;

        // The list endpoint has no completion filter on this API version, so
        // filter in code: only sessions the provider marks complete count.
        Ok(sessions
            .data
            .into_iter()
            .filter(|s| s.status == Some(stripe::CheckoutSessionStatus::Complete))
            .map(session_info)
            .collect())
    }

    async fn create_portal_session(
        &self,
        customer_id: &str,
        return_url: &str,
    ) -> BillingResult<String> {
        let customer_id = Self::parse_customer_id(customer_id)?;

        let mut params = CreateBillingPortalSession::new(customer_id);
        params.return_url = Some(return_url);

        let session = BillingPortalSession::create(&self.client, params).await?;

        tracing::info!(
            customer_id = %session.customer,
            "Created billing portal session"
        );

        Ok(session.url)
    }
}
