use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::dto::catalog_dto::{CreateExamPayload, TransitionResponse};
use crate::error::{Error, Result};
use crate::middleware::auth::Claims;
use crate::models::status::EntityStatus;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct Pagination {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

#[axum::debug_handler]
pub async fn create_exam(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<CreateExamPayload>,
) -> Result<impl IntoResponse> {
    if !claims.is_staff() {
        return Err(Error::Forbidden("Authors and admins only".to_string()));
    }
    payload.validate()?;
    let exam = state
        .catalog_service
        .create_exam(payload, claims.user_id()?)
        .await?;
    Ok((StatusCode::CREATED, Json(exam)))
}

#[axum::debug_handler]
pub async fn list_exams(
    State(state): State<AppState>,
    Query(pagination): Query<Pagination>,
) -> Result<impl IntoResponse> {
    let exams = state
        .catalog_service
        .list_exams(
            pagination.page.unwrap_or(1),
            pagination.per_page.unwrap_or(20).clamp(1, 100),
        )
        .await?;
    Ok(Json(exams))
}

#[axum::debug_handler]
pub async fn get_exam(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let exam = state.catalog_service.get_exam(id).await?;
    Ok(Json(exam))
}

#[axum::debug_handler]
pub async fn list_exam_tests(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let tests = state.catalog_service.list_tests(id).await?;
    Ok(Json(tests))
}

#[axum::debug_handler]
pub async fn ready_exam(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let exam = state
        .status_service
        .transition_exam(id, EntityStatus::Ready)
        .await?;
    Ok(Json(TransitionResponse { status: exam.status }))
}

#[utoipa::path(
    post,
    path = "/api/exams/{id}/activate",
    params(
        ("id" = Uuid, Path, description = "Exam ID")
    ),
    responses(
        (status = 200, description = "Exam activated"),
        (status = 409, description = "Illegal transition"),
        (status = 422, description = "Children not ready"),
    ),
)]
pub async fn activate_exam(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let exam = state
        .status_service
        .transition_exam(id, EntityStatus::Active)
        .await?;
    Ok(Json(TransitionResponse { status: exam.status }))
}

#[axum::debug_handler]
pub async fn archive_exam(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let exam = state
        .status_service
        .transition_exam(id, EntityStatus::Archived)
        .await?;
    Ok(Json(TransitionResponse { status: exam.status }))
}

#[axum::debug_handler]
pub async fn reopen_exam(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let exam = state
        .status_service
        .transition_exam(id, EntityStatus::Draft)
        .await?;
    Ok(Json(TransitionResponse { status: exam.status }))
}
