//! Prepared application questions, nested under an application

use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    Json,
};
use jobtrail_shared::ApplicationQuestion;
use serde::Deserialize;
use uuid::Uuid;

use crate::routes::interviews::assert_application_owner;
use crate::{auth::AuthUser, error::ApiError, state::AppState};

#[derive(Debug, Deserialize)]
pub struct CreateQuestionRequest {
    pub question: String,
    pub answer: Option<String>,
    pub sort_order: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateQuestionRequest {
    pub question: Option<String>,
    pub answer: Option<String>,
    pub sort_order: Option<i32>,
}

/// List questions for an application
pub async fn list_questions(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(application_id): Path<Uuid>,
) -> Result<Json<Vec<ApplicationQuestion>>, ApiError> {
    assert_application_owner(&state.pool, application_id, auth_user.user_id).await?;

    let questions: Vec<ApplicationQuestion> = sqlx::query_as(
        r#"
        SELECT id, application_id, question, answer, sort_order, created_at
        FROM application_questions
        WHERE application_id = $1
        ORDER BY sort_order, created_at
        "#,
    )
    .bind(application_id)
    .fetch_all(&state.pool)
    .await?;

    Ok(Json(questions))
}

/// Add a question
pub async fn create_question(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(application_id): Path<Uuid>,
    Json(req): Json<CreateQuestionRequest>,
) -> Result<(StatusCode, Json<ApplicationQuestion>), ApiError> {
    assert_application_owner(&state.pool, application_id, auth_user.user_id).await?;

    if req.question.trim().is_empty() {
        return Err(ApiError::Validation("question is required".to_string()));
    }

    let question: ApplicationQuestion = sqlx::query_as(
        r#"
        INSERT INTO application_questions (id, application_id, question, answer, sort_order)
        VALUES ($1, $2, $3, $4, COALESCE($5, 0))
        RETURNING id, application_id, question, answer, sort_order, created_at
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(application_id)
    .bind(&req.question)
    .bind(&req.answer)
    .bind(req.sort_order)
    .fetch_one(&state.pool)
    .await?;

    Ok((StatusCode::CREATED, Json(question)))
}

/// Update a question or record its answer
pub async fn update_question(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path((application_id, question_id)): Path<(Uuid, Uuid)>,
    Json(req): Json<UpdateQuestionRequest>,
) -> Result<Json<ApplicationQuestion>, ApiError> {
    assert_application_owner(&state.pool, application_id, auth_user.user_id).await?;

    let question: ApplicationQuestion = sqlx::query_as(
        r#"
        UPDATE application_questions SET
            question = COALESCE($1, question),
            answer = COALESCE($2, answer),
            sort_order = COALESCE($3, sort_order)
        WHERE id = $4 AND application_id = $5
        RETURNING id, application_id, question, answer, sort_order, created_at
        "#,
    )
    .bind(&req.question)
    .bind(&req.answer)
    .bind(req.sort_order)
    .bind(question_id)
    .bind(application_id)
    .fetch_one(&state.pool)
    .await?;

    Ok(Json(question))
}

/// Remove a question
pub async fn delete_question(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path((application_id, question_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, ApiError> {
    assert_application_owner(&state.pool, application_id, auth_user.user_id).await?;

    let deleted =
        sqlx::query("DELETE FROM application_questions WHERE id = $1 AND application_id = $2")
            .bind(question_id)
            .bind(application_id)
            .execute(&state.pool)
            .await?;

    if deleted.rows_affected() == 0 {
        return Err(ApiError::NotFound);
    }

    Ok(StatusCode::NO_CONTENT)
}
