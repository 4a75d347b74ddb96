//! Authentication middleware

use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::AppState;

/// The authenticated user, attached as a request extension
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub email: Option<String>,
}

/// Require a valid bearer token; attaches `AuthUser` on success.
///
/// Also upserts the profile row on first authenticated touch, so the
/// entitlement store always has a row (`has_premium = false`) for any user
/// the rest of the system sees.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or(ApiError::Unauthorized)?;

    let (user_id, email) = state.jwt.verify(token)?;

    ensure_profile(&state, user_id).await?;

    req.extensions_mut().insert(AuthUser { user_id, email });
    Ok(next.run(req).await)
}

async fn ensure_profile(state: &AppState, user_id: Uuid) -> Result<(), ApiError> {
    sqlx::query("INSERT INTO profiles (id) VALUES ($1) ON CONFLICT (id) DO NOTHING")
        .bind(user_id)
        .execute(&state.pool)
        .await?;
    Ok(())
}
