use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::models::status::EntityStatus;

pub const CATEGORIES: &[&str] = &[
    "banking",
    "engineering",
    "medical",
    "law",
    "teaching",
    "other",
];

pub const EXAM_TYPES: &[&str] = &["recruitment", "entrance", "certification", "mock"];

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Exam {
    pub id: Uuid,
    pub name: String,
    pub category: String,
    pub exam_type: String,
    pub difficulty: String,
    pub language: String,
    pub tags: Vec<String>,
    pub status: EntityStatus,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
