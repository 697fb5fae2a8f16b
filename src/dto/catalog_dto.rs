use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::models::quota::SelectionMethod;
use crate::models::status::EntityStatus;
use crate::models::test::CompositionEntry;

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateExamPayload {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    pub category: Option<String>,
    pub exam_type: Option<String>,
    pub difficulty: Option<String>,
    pub language: Option<String>,
    pub tags: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateTestPayload {
    pub exam_id: Uuid,
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(range(min = 1))]
    pub duration_minutes: i32,
    #[validate(range(min = 0.0, max = 100.0))]
    pub passing_score: f64,
    pub total_questions: Option<i32>,
    #[serde(default)]
    pub composition: Vec<CompositionEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateBankPayload {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(length(min = 1, max = 100))]
    pub subject: String,
    pub difficulty: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionOptionPayload {
    pub text: String,
    #[serde(default)]
    pub is_correct: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateQuestionPayload {
    #[validate(length(min = 1))]
    pub prompt: String,
    pub question_type: Option<String>,
    pub difficulty: Option<String>,
    pub topic: Option<String>,
    pub explanation: Option<String>,
    pub options: Vec<QuestionOptionPayload>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateQuotaPayload {
    pub bank_id: Uuid,
    #[validate(range(min = 1))]
    pub requested_count: i32,
    pub selection_method: SelectionMethod,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionResponse {
    pub status: EntityStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelinkResponse {
    pub linked: usize,
    pub skipped: Vec<String>,
}
