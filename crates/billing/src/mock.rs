#![allow(dead_code)]
//! Request-capturing gateway mock for tests

use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use crate::error::{BillingError, BillingResult};
use crate::gateway::{
    CheckoutSessionInfo, CreateCheckoutRequest, PaymentGateway, SessionPaymentStatus,
};

#[derive(Clone, Default)]
pub struct MockGateway {
    pub created_customers: Arc<Mutex<Vec<(String, Uuid)>>>,
    pub checkout_requests: Arc<Mutex<Vec<CreateCheckoutRequest>>>,
    pub completed_sessions: Arc<Mutex<Vec<CheckoutSessionInfo>>>,
    /// Total provider calls made through this mock. The poller short-circuit
    /// property asserts this stays at zero for already-premium users.
    pub calls: Arc<AtomicU64>,
    pub fail_next: Arc<Mutex<Option<String>>>,
}

impl MockGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the session history returned by `list_completed_sessions`.
    pub fn with_completed_session(self, payment_status: SessionPaymentStatus) -> Self {
        let n = self.completed_sessions.lock().map(|s| s.len()).unwrap_or(0);
        let session = CheckoutSessionInfo {
            id: format!("cs_test_{}", n),
            url: None,
            payment_status,
            payment_ref: Some(format!("pi_test_{}", n)),
            amount_total: Some(600),
            currency: Some("usd".to_string()),
        };
        if let Ok(mut sessions) = self.completed_sessions.lock() {
            sessions.push(session);
        }
        self
    }

    /// Make the next gateway call fail as a provider outage.
    pub fn failing(self, message: &str) -> Self {
        if let Ok(mut fail) = self.fail_next.lock() {
            *fail = Some(message.to_string());
        }
        self
    }

    pub fn call_count(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }

    fn check_failure(&self) -> BillingResult<()> {
        if let Ok(mut fail) = self.fail_next.lock() {
            if let Some(message) = fail.take() {
                return Err(BillingError::ProviderUnavailable(message));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl PaymentGateway for MockGateway {
    async fn create_customer(&self, _email: &str, user_id: Uuid) -> BillingResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.check_failure()?;
        let id = format!("cus_test_{}", user_id.simple());
        if let Ok(mut customers) = self.created_customers.lock() {
            customers.push((id.clone(), user_id));
        }
        Ok(id)
    }

    async fn create_checkout_session(
        &self,
        req: CreateCheckoutRequest,
    ) -> BillingResult<CheckoutSessionInfo> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.check_failure()?;
        let n = self.checkout_requests.lock().map(|r| r.len()).unwrap_or(0);
        let session = CheckoutSessionInfo {
            id: format!("cs_test_{}", n),
            url: Some("https://checkout.example.test/session".to_string()),
            payment_status: SessionPaymentStatus::Unpaid,
            payment_ref: None,
            amount_total: Some(req.amount_cents),
            currency: Some("usd".to_string()),
        };
        if let Ok(mut requests) = self.checkout_requests.lock() {
            requests.push(req);
        }
        Ok(session)
    }

    async fn list_completed_sessions(
        &self,
        _customer_id: &str,
        limit: u64,
    ) -> BillingResult<Vec<CheckoutSessionInfo>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.check_failure()?;
        let sessions = self
            .completed_sessions
            .lock()
            .map(|s| s.clone())
            .unwrap_or_default();
        Ok(sessions.into_iter().take(limit as usize).collect())
    }

    async fn create_portal_session(
        &self,
        _customer_id: &str,
        return_url: &str,
    ) -> BillingResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.check_failure()?;
        Ok(format!(
            "https://billing.example.test/portal?return={}",
            return_url
        ))
    }
}
