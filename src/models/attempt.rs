use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "attempt_status", rename_all = "snake_case")]
pub enum AttemptStatus {
    InProgress,
    Submitted,
    Expired,
    Abandoned,
}

impl AttemptStatus {
    pub fn is_terminal(self) -> bool {
        self != AttemptStatus::InProgress
    }
}

impl std::fmt::Display for AttemptStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            AttemptStatus::InProgress => "in_progress",
            AttemptStatus::Submitted => "submitted",
            AttemptStatus::Expired => "expired",
            AttemptStatus::Abandoned => "abandoned",
        };
        f.write_str(s)
    }
}

/// One materialized question, frozen at attempt creation. `correct_index`
/// refers to the shuffled `options` order and never leaves the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionSnapshot {
    pub id: Uuid,
    pub prompt: String,
    pub options: Vec<String>,
    pub correct_index: i32,
}

/// Persisted snapshot document: `{seed, questions:[...]}`. Stored by value so
/// later bank edits cannot alter a historical grade.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptSnapshot {
    pub seed: u64,
    pub questions: Vec<QuestionSnapshot>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Attempt {
    pub id: Uuid,
    pub candidate_id: Uuid,
    pub test_id: Uuid,
    pub status: AttemptStatus,
    pub seed: i64,
    pub snapshot: Json<AttemptSnapshot>,
    pub answers: Json<BTreeMap<Uuid, i32>>,
    pub started_at: DateTime<Utc>,
    pub deadline: DateTime<Utc>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub score: Option<Decimal>,
    pub passed: Option<bool>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
