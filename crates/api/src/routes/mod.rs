//! API routes

pub mod applications;
pub mod billing;
pub mod goals;
pub mod health;
pub mod interviews;
pub mod profile;
pub mod questions;

use axum::{
    middleware,
    routing::{delete, get, post, put},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{auth::require_auth, state::AppState};

/// Create all API routes
pub fn create_router(state: AppState) -> Router {
    // Health check routes (at root level for infrastructure monitoring)
    let health_routes = Router::new()
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness));

    // Public API routes: the webhook authenticates with its signature, not a
    // session
    let public_api_routes = Router::new().route("/billing/webhook", post(billing::webhook));

    // Protected API routes
    let protected_api_routes = Router::new()
        .route("/profile", get(profile::get_profile))
        .route("/profile", put(profile::update_profile))
        .route("/applications", get(applications::list_applications))
        .route("/applications", post(applications::create_application))
        .route("/applications/:id", get(applications::get_application))
        .route("/applications/:id", put(applications::update_application))
        .route("/applications/:id", delete(applications::delete_application))
        .route(
            "/applications/:id/interviews",
            get(interviews::list_interviews).post(interviews::create_interview),
        )
        .route(
            "/applications/:id/interviews/:interview_id",
            put(interviews::update_interview).delete(interviews::delete_interview),
        )
        .route(
            "/applications/:id/questions",
            get(questions::list_questions).post(questions::create_question),
        )
        .route(
            "/applications/:id/questions/:question_id",
            put(questions::update_question).delete(questions::delete_question),
        )
        .route("/goals", get(goals::list_goals))
        .route("/goals", put(goals::upsert_goal))
        .route("/goals/:goal_type", delete(goals::delete_goal))
        .route("/billing/checkout", post(billing::create_checkout))
        .route("/billing/verify", post(billing::verify_premium))
        .route("/billing/portal", post(billing::create_portal_session))
        .layer(middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .merge(health_routes)
        .nest("/api/v1", public_api_routes.merge(protected_api_routes))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
