use axum::{
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde_json::json;
use uuid::Uuid;

use crate::dto::attempt_dto::AttemptView;
use crate::models::status::EntityStatus;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QuotaDimension {
    Tests,
    Questions,
}

impl std::fmt::Display for QuotaDimension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QuotaDimension::Tests => write!(f, "tests"),
            QuotaDimension::Questions => write!(f, "questions"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Not ready: {}", .0.join("; "))]
    NotReady(Vec<String>),

    #[error("Illegal transition: {from} -> {to}")]
    IllegalTransition { from: EntityStatus, to: EntityStatus },

    #[error("Test is not active")]
    NotActive,

    #[error("Bank {0} cannot satisfy its quota")]
    InsufficientPool(Uuid),

    #[error("No active subscription")]
    NoEntitlement,

    #[error("Subscription quota exceeded: {0}")]
    QuotaExceeded(QuotaDimension),

    #[error("Attempt is no longer accepting answers")]
    AttemptFrozen { attempt: Box<AttemptView> },

    #[error("Attempt deadline has passed")]
    Expired { attempt: Box<AttemptView> },

    #[error("Question {0} is not part of this attempt")]
    UnknownQuestion(Uuid),

    #[error("Database error: {0}")]
    Database(sqlx::Error),

    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),

    #[error("HTTP error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl IntoResponse for Error {
    fn into_response(self) -> axum::response::Response {
        let (status, body) = match self {
            Error::BadRequest(msg) => (StatusCode::BAD_REQUEST, json!({ "error": msg })),
            Error::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, json!({ "error": msg })),
            Error::Forbidden(msg) => (StatusCode::FORBIDDEN, json!({ "error": msg })),
            Error::NotFound(msg) => (StatusCode::NOT_FOUND, json!({ "error": msg })),
            Error::Conflict(msg) => (StatusCode::CONFLICT, json!({ "error": msg })),
            Error::NotReady(reasons) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                json!({ "error": "not_ready", "reasons": reasons }),
            ),
            Error::IllegalTransition { from, to } => (
                StatusCode::CONFLICT,
                json!({ "error": "illegal_transition", "from": from, "to": to }),
            ),
            Error::NotActive => (StatusCode::CONFLICT, json!({ "error": "not_active" })),
            Error::InsufficientPool(bank_id) => (
                StatusCode::CONFLICT,
                json!({ "error": "insufficient_pool", "bank_id": bank_id }),
            ),
            Error::NoEntitlement => (
                StatusCode::PAYMENT_REQUIRED,
                json!({ "error": "no_entitlement" }),
            ),
            Error::QuotaExceeded(dimension) => (
                StatusCode::PAYMENT_REQUIRED,
                json!({ "error": "quota_exceeded", "dimension": dimension }),
            ),
            Error::AttemptFrozen { attempt } => (
                StatusCode::CONFLICT,
                json!({ "error": "attempt_frozen", "attempt": attempt }),
            ),
            Error::Expired { attempt } => (
                StatusCode::GONE,
                json!({ "error": "expired", "attempt": attempt }),
            ),
            Error::UnknownQuestion(question_id) => (
                StatusCode::BAD_REQUEST,
                json!({ "error": "unknown_question", "question_id": question_id }),
            ),
            Error::Validation(err) => (StatusCode::BAD_REQUEST, json!({ "error": err.to_string() })),
            Error::Database(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "error": err.to_string() }),
            ),
            Error::Json(err) => (StatusCode::BAD_REQUEST, json!({ "error": err.to_string() })),
            Error::Reqwest(err) => (
                StatusCode::BAD_GATEWAY,
                json!({ "error": format!("External service error: {}", err) }),
            ),
            Error::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, json!({ "error": msg })),
            Error::Io(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "error": err.to_string() }),
            ),
            Error::Anyhow(err) => (StatusCode::BAD_REQUEST, json!({ "error": err.to_string() })),
            Error::Config(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "error": "An unexpected error occurred" }),
            ),
        };

        (status, Json(body)).into_response()
    }
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => Error::NotFound("Resource not found".to_string()),
            other => Error::Database(other),
        }
    }
}
