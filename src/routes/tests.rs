use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use uuid::Uuid;
use validator::Validate;

use crate::dto::attempt_dto::AttemptView;
use crate::dto::catalog_dto::{CreateQuotaPayload, CreateTestPayload, TransitionResponse};
use crate::error::Result;
use crate::middleware::auth::Claims;
use crate::models::status::EntityStatus;
use crate::AppState;

#[axum::debug_handler]
pub async fn create_test(
    State(state): State<AppState>,
    Json(payload): Json<CreateTestPayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let test = state.catalog_service.create_test(payload).await?;
    Ok((StatusCode::CREATED, Json(test)))
}

#[axum::debug_handler]
pub async fn get_test(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let test = state.catalog_service.get_test(id).await?;
    Ok(Json(test))
}

#[axum::debug_handler]
pub async fn add_quota(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<CreateQuotaPayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let quota = state.catalog_service.add_quota(id, payload).await?;
    Ok((StatusCode::CREATED, Json(quota)))
}

#[axum::debug_handler]
pub async fn ready_test(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let test = state
        .status_service
        .transition_test(id, EntityStatus::Ready)
        .await?;
    Ok(Json(TransitionResponse {
        status: test.status,
    }))
}

#[utoipa::path(
    post,
    path = "/api/tests/{id}/activate",
    params(
        ("id" = Uuid, Path, description = "Test ID")
    ),
    responses(
        (status = 200, description = "Test activated"),
        (status = 409, description = "Illegal transition"),
        (status = 422, description = "Test is not ready"),
    ),
)]
pub async fn activate_test(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let test = state
        .status_service
        .transition_test(id, EntityStatus::Active)
        .await?;
    Ok(Json(TransitionResponse {
        status: test.status,
    }))
}

#[axum::debug_handler]
pub async fn archive_test(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let test = state
        .status_service
        .transition_test(id, EntityStatus::Archived)
        .await?;
    Ok(Json(TransitionResponse {
        status: test.status,
    }))
}

#[axum::debug_handler]
pub async fn relink_test(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let outcome = state.relink_service.relink(id).await?;
    Ok(Json(outcome))
}

#[utoipa::path(
    post,
    path = "/api/tests/{id}/attempts",
    params(
        ("id" = Uuid, Path, description = "Test ID")
    ),
    responses(
        (status = 201, description = "Attempt started (idempotent per candidate)"),
        (status = 402, description = "No entitlement or quota exceeded"),
        (status = 409, description = "Test not active or bank pool insufficient"),
    ),
)]
pub async fn start_attempt(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let candidate_id = claims.user_id()?;
    let attempt = state.attempt_service.start_attempt(candidate_id, id).await?;
    Ok((StatusCode::CREATED, Json(AttemptView::from(&attempt))))
}
