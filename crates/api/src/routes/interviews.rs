//! Interview rounds, nested under an application

use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    Json,
};
use jobtrail_shared::ApplicationInterview;
use serde::Deserialize;
use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{auth::AuthUser, error::ApiError, state::AppState};

/// Verify the application belongs to the caller before touching children
pub(crate) async fn assert_application_owner(
    pool: &PgPool,
    application_id: Uuid,
    user_id: Uuid,
) -> Result<(), ApiError> {
    let owned: Option<(Uuid,)> =
        sqlx::query_as("SELECT id FROM job_applications WHERE id = $1 AND user_id = $2")
            .bind(application_id)
            .bind(user_id)
            .fetch_optional(pool)
            .await?;

    match owned {
        Some(_) => Ok(()),
        None => Err(ApiError::NotFound),
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateInterviewRequest {
    pub round_number: Option<i32>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub interview_date: Option<OffsetDateTime>,
    pub location: Option<String>,
    pub notes: Option<String>,
    pub feedback: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateInterviewRequest {
    pub round_number: Option<i32>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub interview_date: Option<OffsetDateTime>,
    pub location: Option<String>,
    pub notes: Option<String>,
    pub feedback: Option<String>,
}

/// List interview rounds for an application
pub async fn list_interviews(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(application_id): Path<Uuid>,
) -> Result<Json<Vec<ApplicationInterview>>, ApiError> {
    assert_application_owner(&state.pool, application_id, auth_user.user_id).await?;

    let interviews: Vec<ApplicationInterview> = sqlx::query_as(
        r#"
        SELECT id, application_id, round_number, interview_date, location, notes, feedback,
               created_at, updated_at
        FROM application_interviews
        WHERE application_id = $1
        ORDER BY round_number
        "#,
    )
    .bind(application_id)
    .fetch_all(&state.pool)
    .await?;

    Ok(Json(interviews))
}

/// Add an interview round
pub async fn create_interview(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(application_id): Path<Uuid>,
    Json(req): Json<CreateInterviewRequest>,
) -> Result<(StatusCode, Json<ApplicationInterview>), ApiError> {
    assert_application_owner(&state.pool, application_id, auth_user.user_id).await?;

    let interview: ApplicationInterview = sqlx::query_as(
        r#"
        INSERT INTO application_interviews
            (id, application_id, round_number, interview_date, location, notes, feedback)
        VALUES ($1, $2, COALESCE($3, 1), $4, $5, $6, $7)
        RETURNING id, application_id, round_number, interview_date, location, notes, feedback,
                  created_at, updated_at
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(application_id)
    .bind(req.round_number)
    .bind(req.interview_date)
    .bind(&req.location)
    .bind(&req.notes)
    .bind(&req.feedback)
    .fetch_one(&state.pool)
    .await?;

    Ok((StatusCode::CREATED, Json(interview)))
}

/// Update an interview round
pub async fn update_interview(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path((application_id, interview_id)): Path<(Uuid, Uuid)>,
    Json(req): Json<UpdateInterviewRequest>,
) -> Result<Json<ApplicationInterview>, ApiError> {
    assert_application_owner(&state.pool, application_id, auth_user.user_id).await?;

    let interview: ApplicationInterview = sqlx::query_as(
        r#"
        UPDATE application_interviews SET
            round_number = COALESCE($1, round_number),
            interview_date = COALESCE($2, interview_date),
            location = COALESCE($3, location),
            notes = COALESCE($4, notes),
            feedback = COALESCE($5, feedback),
            updated_at = NOW()
        WHERE id = $6 AND application_id = $7
        RETURNING id, application_id, round_number, interview_date, location, notes, feedback,
                  created_at, updated_at
        "#,
    )
    .bind(req.round_number)
    .bind(req.interview_date)
    .bind(&req.location)
    .bind(&req.notes)
    .bind(&req.feedback)
    .bind(interview_id)
    .bind(application_id)
    .fetch_one(&state.pool)
    .await?;

    Ok(Json(interview))
}

/// Remove an interview round
pub async fn delete_interview(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path((application_id, interview_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, ApiError> {
    assert_application_owner(&state.pool, application_id, auth_user.user_id).await?;

    let deleted =
        sqlx::query("DELETE FROM application_interviews WHERE id = $1 AND application_id = $2")
            .bind(interview_id)
            .bind(application_id)
            .execute(&state.pool)
            .await?;

    if deleted.rows_affected() == 0 {
        return Err(ApiError::NotFound);
    }

    Ok(StatusCode::NO_CONTENT)
}
