//! Career goal routes. One goal per time horizon per user.

use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    Json,
};
use jobtrail_shared::{CareerGoal, CareerGoalType};
use serde::Deserialize;
use uuid::Uuid;

use crate::{auth::AuthUser, error::ApiError, state::AppState};

#[derive(Debug, Deserialize)]
pub struct UpsertGoalRequest {
    pub goal_type: CareerGoalType,
    pub title: String,
    pub description: Option<String>,
    pub notes: Option<String>,
}

/// List the caller's goals
pub async fn list_goals(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
) -> Result<Json<Vec<CareerGoal>>, ApiError> {
    let goals: Vec<CareerGoal> = sqlx::query_as(
        r#"
        SELECT id, user_id, goal_type, title, description, notes, updated_at
        FROM career_goals
        WHERE user_id = $1
        ORDER BY goal_type
        "#,
    )
    .bind(auth_user.user_id)
    .fetch_all(&state.pool)
    .await?;

    Ok(Json(goals))
}

/// Create or replace the goal for a time horizon
pub async fn upsert_goal(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Json(req): Json<UpsertGoalRequest>,
) -> Result<Json<CareerGoal>, ApiError> {
    if req.title.trim().is_empty() {
        return Err(ApiError::Validation("title is required".to_string()));
    }

    let goal: CareerGoal = sqlx::query_as(
        r#"
        INSERT INTO career_goals (id, user_id, goal_type, title, description, notes)
        VALUES ($1, $2, $3, $4, $5, $6)
        ON CONFLICT (user_id, goal_type) DO UPDATE SET
            title = EXCLUDED.title,
            description = EXCLUDED.description,
            notes = EXCLUDED.notes,
            updated_at = NOW()
        RETURNING id, user_id, goal_type, title, description, notes, updated_at
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(auth_user.user_id)
    .bind(req.goal_type)
    .bind(&req.title)
    .bind(&req.description)
    .bind(&req.notes)
    .fetch_one(&state.pool)
    .await?;

    Ok(Json(goal))
}

/// Delete the goal for a time horizon
pub async fn delete_goal(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(goal_type): Path<CareerGoalType>,
) -> Result<StatusCode, ApiError> {
    let deleted = sqlx::query("DELETE FROM career_goals WHERE user_id = $1 AND goal_type = $2")
        .bind(auth_user.user_id)
        .bind(goal_type)
        .execute(&state.pool)
        .await?;

    if deleted.rows_affected() == 0 {
        return Err(ApiError::NotFound);
    }

    Ok(StatusCode::NO_CONTENT)
}
