//! Shared application state

use std::sync::Arc;

use jobtrail_billing::BillingService;
use sqlx::PgPool;

use crate::auth::JwtVerifier;
use crate::config::Config;

/// State shared across all request handlers
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Arc<Config>,
    pub jwt: JwtVerifier,
    /// Absent when billing is disabled or unconfigured; billing endpoints
    /// return 503 in that case.
    pub billing: Option<Arc<BillingService>>,
}

impl AppState {
    pub fn new(pool: PgPool, config: Config, billing: Option<Arc<BillingService>>) -> Self {
        Self {
            pool,
            jwt: JwtVerifier::new(&config.supabase_jwt_secret),
            config: Arc::new(config),
            billing,
        }
    }
}
