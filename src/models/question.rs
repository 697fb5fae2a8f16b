use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

pub const MCQ: &str = "mcq";
pub const MIN_OPTIONS: usize = 2;
pub const MAX_OPTIONS: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionOption {
    pub text: String,
    pub is_correct: bool,
}

/// Difficulty tier used by the weighted selection method. Unknown values in
/// the column fall back to `Medium`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    pub fn parse(raw: &str) -> Difficulty {
        match raw {
            "easy" => Difficulty::Easy,
            "hard" => Difficulty::Hard,
            _ => Difficulty::Medium,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Question {
    pub id: Uuid,
    pub bank_id: Uuid,
    pub position: i32,
    pub prompt: String,
    pub question_type: String,
    pub difficulty: String,
    pub topic: Option<String>,
    pub explanation: Option<String>,
    pub verified: bool,
    pub options: Json<Vec<QuestionOption>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Question {
    pub fn is_mcq(&self) -> bool {
        self.question_type == MCQ
    }

    /// Index of the single correct option, when the MCQ invariant holds.
    pub fn correct_index(&self) -> Option<usize> {
        let mut correct = self.options.0.iter().enumerate().filter(|(_, o)| o.is_correct);
        let first = correct.next()?;
        if correct.next().is_some() {
            return None;
        }
        Some(first.0)
    }
}
