//! Job application routes
//!
//! Creation is the paywalled write: the gate runs before every insert and
//! a denied check surfaces as the upsell error, not a generic failure.

use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    Json,
};
use jobtrail_shared::{ApplicationPriority, ApplicationStatus, JobApplication};
use serde::Deserialize;
use uuid::Uuid;

use crate::{auth::AuthUser, error::ApiError, state::AppState};

#[derive(Debug, Deserialize)]
pub struct CreateApplicationRequest {
    pub company_name: String,
    pub job_title: String,
    pub application_url: Option<String>,
    pub status: Option<ApplicationStatus>,
    pub priority: Option<ApplicationPriority>,
    pub application_date: Option<time::Date>,
    pub location: Option<String>,
    pub notes: Option<String>,
    pub motivation: Option<String>,
    pub fit_notes: Option<String>,
    pub pitch_text: Option<String>,
    pub company_research: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateApplicationRequest {
    pub company_name: Option<String>,
    pub job_title: Option<String>,
    pub application_url: Option<String>,
    pub status: Option<ApplicationStatus>,
    pub priority: Option<ApplicationPriority>,
    pub application_date: Option<time::Date>,
    pub location: Option<String>,
    pub notes: Option<String>,
    pub motivation: Option<String>,
    pub fit_notes: Option<String>,
    pub pitch_text: Option<String>,
    pub company_research: Option<String>,
}

const APPLICATION_COLUMNS: &str = r#"
    id, user_id, company_name, job_title, application_url, status, priority,
    application_date, location, notes, motivation, fit_notes, pitch_text,
    company_research, created_at, updated_at
"#;

/// List the caller's applications, newest first
pub async fn list_applications(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
) -> Result<Json<Vec<JobApplication>>, ApiError> {
    let applications: Vec<JobApplication> = sqlx::query_as(&format!(
        "SELECT {APPLICATION_COLUMNS} FROM job_applications WHERE user_id = $1 ORDER BY created_at DESC"
    ))
    .bind(auth_user.user_id)
    .fetch_all(&state.pool)
    .await?;

    Ok(Json(applications))
}

/// Create an application, gated by the free-tier paywall
pub async fn create_application(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Json(req): Json<CreateApplicationRequest>,
) -> Result<(StatusCode, Json<JobApplication>), ApiError> {
    if req.company_name.trim().is_empty() || req.job_title.trim().is_empty() {
        return Err(ApiError::Validation(
            "company_name and job_title are required".to_string(),
        ));
    }

    if let Some(billing) = state.billing.as_ref() {
        let decision = billing.paywall.check(auth_user.user_id).await?;
        if !decision.is_allowed() {
            return Err(ApiError::LimitReached);
        }
    }

    let application: JobApplication = sqlx::query_as(&format!(
        r#"
        INSERT INTO job_applications (
            id, user_id, company_name, job_title, application_url, status, priority,
            application_date, location, notes, motivation, fit_notes, pitch_text,
            company_research
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, COALESCE($8, CURRENT_DATE), $9, $10, $11, $12, $13, $14)
        RETURNING {APPLICATION_COLUMNS}
        "#
    ))
    .bind(Uuid::new_v4())
    .bind(auth_user.user_id)
    .bind(&req.company_name)
    .bind(&req.job_title)
    .bind(&req.application_url)
    .bind(req.status.unwrap_or_default())
    .bind(req.priority.unwrap_or_default())
    .bind(req.application_date)
    .bind(&req.location)
    .bind(&req.notes)
    .bind(&req.motivation)
    .bind(&req.fit_notes)
    .bind(&req.pitch_text)
    .bind(&req.company_research)
    .fetch_one(&state.pool)
    .await?;

    tracing::info!(
        user_id = %auth_user.user_id,
        application_id = %application.id,
        "Application created"
    );

    Ok((StatusCode::CREATED, Json(application)))
}

/// Get one application owned by the caller
pub async fn get_application(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<JobApplication>, ApiError> {
    let application: JobApplication = sqlx::query_as(&format!(
        "SELECT {APPLICATION_COLUMNS} FROM job_applications WHERE id = $1 AND user_id = $2"
    ))
    .bind(id)
    .bind(auth_user.user_id)
    .fetch_one(&state.pool)
    .await?;

    Ok(Json(application))
}

/// Update an application owned by the caller
pub async fn update_application(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateApplicationRequest>,
) -> Result<Json<JobApplication>, ApiError> {
    let application: JobApplication = sqlx::query_as(&format!(
        r#"
        UPDATE job_applications SET
            company_name = COALESCE($1, company_name),
            job_title = COALESCE($2, job_title),
            application_url = COALESCE($3, application_url),
            status = COALESCE($4, status),
            priority = COALESCE($5, priority),
            application_date = COALESCE($6, application_date),
            location = COALESCE($7, location),
            notes = COALESCE($8, notes),
            motivation = COALESCE($9, motivation),
            fit_notes = COALESCE($10, fit_notes),
            pitch_text = COALESCE($11, pitch_text),
            company_research = COALESCE($12, company_research),
            updated_at = NOW()
        WHERE id = $13 AND user_id = $14
        RETURNING {APPLICATION_COLUMNS}
        "#
    ))
    .bind(&req.company_name)
    .bind(&req.job_title)
    .bind(&req.application_url)
    .bind(req.status)
    .bind(req.priority)
    .bind(req.application_date)
    .bind(&req.location)
    .bind(&req.notes)
    .bind(&req.motivation)
    .bind(&req.fit_notes)
    .bind(&req.pitch_text)
    .bind(&req.company_research)
    .bind(id)
    .bind(auth_user.user_id)
    .fetch_one(&state.pool)
    .await?;

    Ok(Json(application))
}

/// Delete an application owned by the caller
pub async fn delete_application(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let deleted = sqlx::query("DELETE FROM job_applications WHERE id = $1 AND user_id = $2")
        .bind(id)
        .bind(auth_user.user_id)
        .execute(&state.pool)
        .await?;

    if deleted.rows_affected() == 0 {
        return Err(ApiError::NotFound);
    }

    Ok(StatusCode::NO_CONTENT)
}
