//! JobTrail API server entry point

use std::sync::Arc;

use jobtrail_api::{routes, AppState, Config};
use jobtrail_billing::BillingService;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            "jobtrail_api=info,jobtrail_billing=info,tower_http=info".into()
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;

    let pool = jobtrail_shared::create_pool(&config.database_url, config.database_max_connections)
        .await?;
    jobtrail_shared::run_migrations(&pool).await?;

    let billing = if config.enable_billing && !config.stripe_secret_key.is_empty() {
        match BillingService::from_env(pool.clone()) {
            Ok(service) => Some(Arc::new(service)),
            Err(e) => {
                tracing::warn!(error = %e, "Billing disabled: configuration incomplete");
                None
            }
        }
    } else {
        tracing::warn!("Billing disabled");
        None
    };

    let bind_address = config.bind_address.clone();
    let state = AppState::new(pool, config, billing);
    let app = routes::create_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    tracing::info!(address = %bind_address, "JobTrail API listening");

    axum::serve(listener, app).await?;

    Ok(())
}
