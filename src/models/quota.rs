use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "selection_method", rename_all = "snake_case")]
pub enum SelectionMethod {
    Random,
    Sequential,
    WeightedByDifficulty,
}

/// Join row: "draw `requested_count` questions from `bank_id` using
/// `selection_method`" for one test.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TestBankQuota {
    pub id: Uuid,
    pub test_id: Uuid,
    pub bank_id: Uuid,
    pub requested_count: i32,
    pub selection_method: SelectionMethod,
    pub created_at: DateTime<Utc>,
}
