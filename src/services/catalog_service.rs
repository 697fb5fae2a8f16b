use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use sqlx::types::Json;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::dto::catalog_dto::{
    CreateBankPayload, CreateExamPayload, CreateQuestionPayload, CreateQuotaPayload,
    CreateTestPayload,
};
use crate::error::{Error, Result};
use crate::models::exam::{Exam, CATEGORIES, EXAM_TYPES};
use crate::models::question::{Question, QuestionOption, MCQ};
use crate::models::question_bank::QuestionBank;
use crate::models::quota::TestBankQuota;
use crate::models::status::EntityStatus;
use crate::models::test::Test;
use crate::services::readiness::{BankPool, QuotaLink, TestGraph};

/// Loads the full composition graph of one test: quota rows in ascending
/// `(bank_id, id)` order, each with its bank and the bank's questions in
/// insertion order. Callers pass a transaction connection when the graph
/// must be consistent with row locks they already hold.
pub async fn load_test_graph(conn: &mut PgConnection, test: Test) -> Result<TestGraph> {
    let quotas = sqlx::query_as::<_, TestBankQuota>(
        "SELECT * FROM test_bank_quotas WHERE test_id = $1 ORDER BY bank_id, id",
    )
    .bind(test.id)
    .fetch_all(&mut *conn)
    .await?;

    let mut links = Vec::with_capacity(quotas.len());
    for quota in quotas {
        let bank = sqlx::query_as::<_, QuestionBank>("SELECT * FROM question_banks WHERE id = $1")
            .bind(quota.bank_id)
            .fetch_optional(&mut *conn)
            .await?;
        let pool = match bank {
            Some(bank) => {
                let questions = sqlx::query_as::<_, Question>(
                    "SELECT * FROM questions WHERE bank_id = $1 ORDER BY position",
                )
                .bind(bank.id)
                .fetch_all(&mut *conn)
                .await?;
                Some(BankPool { bank, questions })
            }
            None => None,
        };
        links.push(QuotaLink { quota, pool });
    }

    Ok(TestGraph { test, links })
}

pub async fn load_exam_graphs(conn: &mut PgConnection, exam_id: Uuid) -> Result<Vec<TestGraph>> {
    let tests = sqlx::query_as::<_, Test>(
        "SELECT * FROM tests WHERE exam_id = $1 ORDER BY created_at",
    )
    .bind(exam_id)
    .fetch_all(&mut *conn)
    .await?;

    let mut graphs = Vec::with_capacity(tests.len());
    for test in tests {
        graphs.push(load_test_graph(&mut *conn, test).await?);
    }
    Ok(graphs)
}

#[derive(Clone)]
pub struct CatalogService {
    pool: PgPool,
}

impl CatalogService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create_exam(
        &self,
        payload: CreateExamPayload,
        created_by: Uuid,
    ) -> Result<Exam> {
        let category = payload.category.unwrap_or_else(|| "other".to_string());
        if !CATEGORIES.contains(&category.as_str()) {
            return Err(Error::BadRequest(format!(
                "Unknown category '{}'. Allowed: {}",
                category,
                CATEGORIES.join(", ")
            )));
        }
        let exam_type = payload.exam_type.unwrap_or_else(|| "mock".to_string());
        if !EXAM_TYPES.contains(&exam_type.as_str()) {
            return Err(Error::BadRequest(format!(
                "Unknown exam_type '{}'. Allowed: {}",
                exam_type,
                EXAM_TYPES.join(", ")
            )));
        }

        let exam = sqlx::query_as::<_, Exam>(
            r#"
            INSERT INTO exams (name, category, exam_type, difficulty, language, tags, created_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(payload.name)
        .bind(category)
        .bind(exam_type)
        .bind(payload.difficulty.unwrap_or_else(|| "medium".to_string()))
        .bind(payload.language.unwrap_or_else(|| "en".to_string()))
        .bind(payload.tags.unwrap_or_default())
        .bind(created_by)
        .fetch_one(&self.pool)
        .await?;

        Ok(exam)
    }

    pub async fn get_exam(&self, exam_id: Uuid) -> Result<Exam> {
        sqlx::query_as::<_, Exam>("SELECT * FROM exams WHERE id = $1")
            .bind(exam_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| Error::NotFound("Exam not found".to_string()))
    }

    pub async fn list_exams(&self, page: i64, per_page: i64) -> Result<Vec<Exam>> {
        let offset = (page.max(1) - 1) * per_page;
        let exams = sqlx::query_as::<_, Exam>(
            "SELECT * FROM exams ORDER BY created_at DESC LIMIT $1 OFFSET $2",
        )
        .bind(per_page)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;
        Ok(exams)
    }

    pub async fn create_test(&self, payload: CreateTestPayload) -> Result<Test> {
        // reject tests for exams that do not exist up front
        self.get_exam(payload.exam_id).await?;

        let passing_score = Decimal::from_f64(payload.passing_score)
            .ok_or_else(|| Error::BadRequest("Invalid passing score".to_string()))?
            .round_dp(1);

        let test = sqlx::query_as::<_, Test>(
            r#"
            INSERT INTO tests (exam_id, title, duration_minutes, passing_score, total_questions, composition)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(payload.exam_id)
        .bind(payload.title)
        .bind(payload.duration_minutes)
        .bind(passing_score)
        .bind(payload.total_questions)
        .bind(Json(payload.composition))
        .fetch_one(&self.pool)
        .await?;

        Ok(test)
    }

    pub async fn get_test(&self, test_id: Uuid) -> Result<Test> {
        sqlx::query_as::<_, Test>("SELECT * FROM tests WHERE id = $1")
            .bind(test_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| Error::NotFound("Test not found".to_string()))
    }

    pub async fn list_tests(&self, exam_id: Uuid) -> Result<Vec<Test>> {
        let tests = sqlx::query_as::<_, Test>(
            "SELECT * FROM tests WHERE exam_id = $1 ORDER BY created_at",
        )
        .bind(exam_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(tests)
    }

    pub async fn add_quota(&self, test_id: Uuid, payload: CreateQuotaPayload) -> Result<TestBankQuota> {
        let test = self.get_test(test_id).await?;
        if test.status != EntityStatus::Draft {
            return Err(Error::Conflict(format!(
                "Test is {}; composition can only change in draft",
                test.status
            )));
        }

        let quota = sqlx::query_as::<_, TestBankQuota>(
            r#"
            INSERT INTO test_bank_quotas (test_id, bank_id, requested_count, selection_method)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(test_id)
        .bind(payload.bank_id)
        .bind(payload.requested_count)
        .bind(payload.selection_method)
        .fetch_one(&self.pool)
        .await?;

        Ok(quota)
    }

    pub async fn create_bank(&self, payload: CreateBankPayload, created_by: Uuid) -> Result<QuestionBank> {
        let bank = sqlx::query_as::<_, QuestionBank>(
            r#"
            INSERT INTO question_banks (name, subject, difficulty, created_by)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(payload.name)
        .bind(payload.subject)
        .bind(payload.difficulty.unwrap_or_else(|| "medium".to_string()))
        .bind(created_by)
        .fetch_one(&self.pool)
        .await?;

        Ok(bank)
    }

    pub async fn get_bank(&self, bank_id: Uuid) -> Result<QuestionBank> {
        sqlx::query_as::<_, QuestionBank>("SELECT * FROM question_banks WHERE id = $1")
            .bind(bank_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| Error::NotFound("Question bank not found".to_string()))
    }

    pub async fn list_banks(&self) -> Result<Vec<QuestionBank>> {
        let banks = sqlx::query_as::<_, QuestionBank>(
            "SELECT * FROM question_banks ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(banks)
    }

    pub async fn add_question(
        &self,
        bank_id: Uuid,
        payload: CreateQuestionPayload,
    ) -> Result<Question> {
        self.get_bank(bank_id).await?;
        self.ensure_bank_unreferenced(bank_id, "modify").await?;

        let question_type = payload.question_type.unwrap_or_else(|| MCQ.to_string());
        let options: Vec<QuestionOption> = payload
            .options
            .into_iter()
            .map(|o| QuestionOption {
                text: o.text,
                is_correct: o.is_correct,
            })
            .collect();

        let question = sqlx::query_as::<_, Question>(
            r#"
            INSERT INTO questions (bank_id, position, prompt, question_type, difficulty, topic, explanation, options)
            VALUES (
                $1,
                (SELECT COALESCE(MAX(position), 0) + 1 FROM questions WHERE bank_id = $1),
                $2, $3, $4, $5, $6, $7
            )
            RETURNING *
            "#,
        )
        .bind(bank_id)
        .bind(payload.prompt)
        .bind(question_type)
        .bind(payload.difficulty.unwrap_or_else(|| "medium".to_string()))
        .bind(payload.topic)
        .bind(payload.explanation)
        .bind(Json(options))
        .fetch_one(&self.pool)
        .await?;

        Ok(question)
    }

    pub async fn list_questions(&self, bank_id: Uuid) -> Result<Vec<Question>> {
        let questions = sqlx::query_as::<_, Question>(
            "SELECT * FROM questions WHERE bank_id = $1 ORDER BY position",
        )
        .bind(bank_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(questions)
    }

    pub async fn delete_bank(&self, bank_id: Uuid) -> Result<()> {
        self.get_bank(bank_id).await?;
        self.ensure_bank_unreferenced(bank_id, "delete").await?;

        sqlx::query("DELETE FROM test_bank_quotas WHERE bank_id = $1")
            .bind(bank_id)
            .execute(&self.pool)
            .await?;
        sqlx::query("DELETE FROM question_banks WHERE id = $1")
            .bind(bank_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Banks are frozen while any ready or active test draws from them.
    async fn ensure_bank_unreferenced(&self, bank_id: Uuid, verb: &str) -> Result<()> {
        let referencing: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM test_bank_quotas q
            JOIN tests t ON t.id = q.test_id
            WHERE q.bank_id = $1 AND t.status IN ('ready', 'active')
            "#,
        )
        .bind(bank_id)
        .fetch_one(&self.pool)
        .await?;

        if referencing > 0 {
            return Err(Error::Conflict(format!(
                "Cannot {} bank: {} ready or active test(s) reference it. Archive them first.",
                verb, referencing
            )));
        }
        Ok(())
    }
}
