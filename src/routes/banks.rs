use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use serde_json::json;
use uuid::Uuid;
use validator::Validate;

use crate::dto::catalog_dto::{CreateBankPayload, CreateQuestionPayload};
use crate::error::{Error, Result};
use crate::middleware::auth::Claims;
use crate::AppState;

fn require_staff(claims: &Claims) -> Result<()> {
    if !claims.is_staff() {
        return Err(Error::Forbidden("Authors and admins only".to_string()));
    }
    Ok(())
}

#[axum::debug_handler]
pub async fn create_bank(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<CreateBankPayload>,
) -> Result<impl IntoResponse> {
    require_staff(&claims)?;
    payload.validate()?;
    let bank = state
        .catalog_service
        .create_bank(payload, claims.user_id()?)
        .await?;
    Ok((StatusCode::CREATED, Json(bank)))
}

#[axum::debug_handler]
pub async fn list_banks(State(state): State<AppState>) -> Result<impl IntoResponse> {
    let banks = state.catalog_service.list_banks().await?;
    Ok(Json(banks))
}

#[axum::debug_handler]
pub async fn get_bank(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let bank = state.catalog_service.get_bank(id).await?;
    Ok(Json(bank))
}

#[axum::debug_handler]
pub async fn delete_bank(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    require_staff(&claims)?;
    state.catalog_service.delete_bank(id).await?;
    Ok(Json(json!({ "deleted": true })))
}

#[axum::debug_handler]
pub async fn add_question(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Json(payload): Json<CreateQuestionPayload>,
) -> Result<impl IntoResponse> {
    require_staff(&claims)?;
    payload.validate()?;
    let question = state.catalog_service.add_question(id, payload).await?;
    Ok((StatusCode::CREATED, Json(question)))
}

#[axum::debug_handler]
pub async fn list_questions(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let questions = state.catalog_service.list_questions(id).await?;
    Ok(Json(questions))
}
