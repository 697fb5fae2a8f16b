use axum::{extract::State, response::IntoResponse, Extension, Json};

use crate::error::Result;
use crate::middleware::auth::Claims;
use crate::services::entitlement_service::EntitlementService;
use crate::AppState;

#[axum::debug_handler]
pub async fn my_subscription(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse> {
    let view = EntitlementService::current_view(&state.pool, claims.user_id()?).await?;
    Ok(Json(view))
}
