use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::models::attempt::{Attempt, AttemptStatus};

/// A question as shown to the candidate. The correct index never appears
/// here; it lives only in the stored snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionView {
    pub id: Uuid,
    pub prompt: String,
    pub options: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttemptView {
    pub id: Uuid,
    pub test_id: Uuid,
    pub status: AttemptStatus,
    pub questions: Vec<QuestionView>,
    pub answers: BTreeMap<Uuid, i32>,
    pub started_at: DateTime<Utc>,
    pub deadline: DateTime<Utc>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub score: Option<f64>,
    pub passed: Option<bool>,
}

impl From<&Attempt> for AttemptView {
    fn from(attempt: &Attempt) -> Self {
        let questions = attempt
            .snapshot
            .0
            .questions
            .iter()
            .map(|q| QuestionView {
                id: q.id,
                prompt: q.prompt.clone(),
                options: q.options.clone(),
            })
            .collect();

        Self {
            id: attempt.id,
            test_id: attempt.test_id,
            status: attempt.status,
            questions,
            answers: attempt.answers.0.clone(),
            started_at: attempt.started_at,
            deadline: attempt.deadline,
            submitted_at: attempt.submitted_at,
            score: attempt.score.and_then(|s| s.to_f64()),
            passed: attempt.passed,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SaveAnswerRequest {
    pub question_id: Uuid,
    #[validate(range(min = 0, max = 7))]
    pub selected_option_index: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaveAnswerResponse {
    pub recorded: bool,
    pub question_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitResponse {
    pub score: f64,
    pub passed: bool,
    pub terminal_status: AttemptStatus,
}

impl From<&Attempt> for SubmitResponse {
    fn from(attempt: &Attempt) -> Self {
        Self {
            score: attempt.score.and_then(|s| s.to_f64()).unwrap_or(0.0),
            passed: attempt.passed.unwrap_or(false),
            terminal_status: attempt.status,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepResponse {
    pub swept: u64,
}
