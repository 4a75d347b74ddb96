//! Profile routes

use axum::{
    extract::{Extension, State},
    Json,
};
use jobtrail_shared::Profile;
use serde::Deserialize;

use crate::{auth::AuthUser, error::ApiError, state::AppState};

/// Get the caller's profile
pub async fn get_profile(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
) -> Result<Json<Profile>, ApiError> {
    let profile: Profile = sqlx::query_as(
        r#"
        SELECT id, full_name, has_premium, stripe_customer_id, created_at, updated_at
        FROM profiles
        WHERE id = $1
        "#,
    )
    .bind(auth_user.user_id)
    .fetch_one(&state.pool)
    .await?;

    Ok(Json(profile))
}

#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    pub full_name: Option<String>,
}

/// Update the caller's profile. Entitlement fields are not writable here;
/// only the billing subsystem mutates those.
pub async fn update_profile(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Json(req): Json<UpdateProfileRequest>,
) -> Result<Json<Profile>, ApiError> {
    let profile: Profile = sqlx::query_as(
        r#"
        UPDATE profiles
        SET full_name = $1, updated_at = NOW()
        WHERE id = $2
        RETURNING id, full_name, has_premium, stripe_customer_id, created_at, updated_at
        "#,
    )
    .bind(&req.full_name)
    .bind(auth_user.user_id)
    .fetch_one(&state.pool)
    .await?;

    Ok(Json(profile))
}
