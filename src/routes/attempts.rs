use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Extension, Json,
};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::dto::attempt_dto::{
    AttemptView, SaveAnswerRequest, SaveAnswerResponse, SubmitResponse, SweepResponse,
};
use crate::error::{Error, Result};
use crate::middleware::auth::Claims;
use crate::AppState;

#[axum::debug_handler]
pub async fn get_attempt(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let attempt = state.attempt_service.get_attempt(id).await?;
    if attempt.candidate_id != claims.user_id()? && !claims.is_staff() {
        return Err(Error::Forbidden(
            "Attempt belongs to another candidate".to_string(),
        ));
    }
    Ok(Json(AttemptView::from(&attempt)))
}

#[axum::debug_handler]
pub async fn save_answer(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Json(req): Json<SaveAnswerRequest>,
) -> Result<impl IntoResponse> {
    req.validate()?;
    state
        .attempt_service
        .record_answer(id, claims.user_id()?, req.question_id, req.selected_option_index)
        .await?;
    Ok(Json(SaveAnswerResponse {
        recorded: true,
        question_id: req.question_id,
    }))
}

#[axum::debug_handler]
pub async fn submit_attempt(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let attempt = state
        .attempt_service
        .submit_attempt(id, claims.user_id()?)
        .await?;
    Ok(Json(SubmitResponse::from(&attempt)))
}

#[derive(Debug, Deserialize)]
pub struct SweepParams {
    pub batch_size: Option<i64>,
}

#[axum::debug_handler]
pub async fn sweep_expired(
    State(state): State<AppState>,
    Query(params): Query<SweepParams>,
) -> Result<impl IntoResponse> {
    let batch = params
        .batch_size
        .unwrap_or(crate::config::get_config().sweep_batch_size)
        .clamp(1, 1000);
    let swept = state.attempt_service.sweep_expired(batch).await?;
    Ok(Json(SweepResponse { swept }))
}
