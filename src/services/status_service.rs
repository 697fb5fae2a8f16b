use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::exam::Exam;
use crate::models::status::EntityStatus;
use crate::models::test::Test;
use crate::services::catalog_service::{load_exam_graphs, load_test_graph};
use crate::services::readiness;

/// Sole writer of the `status` columns on exams and tests. Every transition
/// serializes on a row lock taken before any check runs.
#[derive(Clone)]
pub struct StatusService {
    pool: PgPool,
}

impl StatusService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn transition_test(&self, test_id: Uuid, target: EntityStatus) -> Result<Test> {
        let mut tx = self.pool.begin().await?;

        let test = sqlx::query_as::<_, Test>("SELECT * FROM tests WHERE id = $1 FOR UPDATE")
            .bind(test_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| Error::NotFound("Test not found".to_string()))?;

        test.status.check_transition(target)?;

        if target == EntityStatus::Ready {
            let graph = load_test_graph(&mut tx, test.clone()).await?;
            let issues = readiness::test_issues(&graph);
            if !issues.is_empty() {
                return Err(Error::NotReady(issues));
            }
        }

        let updated = sqlx::query_as::<_, Test>(
            "UPDATE tests SET status = $2, updated_at = NOW() WHERE id = $1 RETURNING *",
        )
        .bind(test_id)
        .bind(target)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        tracing::info!(test_id = %test_id, from = %test.status, to = %target, "test transitioned");
        Ok(updated)
    }

    pub async fn transition_exam(&self, exam_id: Uuid, target: EntityStatus) -> Result<Exam> {
        let mut tx = self.pool.begin().await?;

        let exam = sqlx::query_as::<_, Exam>("SELECT * FROM exams WHERE id = $1 FOR UPDATE")
            .bind(exam_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| Error::NotFound("Exam not found".to_string()))?;

        exam.status.check_transition(target)?;

        match target {
            EntityStatus::Ready => {
                let children = load_exam_graphs(&mut tx, exam_id).await?;
                let issues = readiness::exam_issues(&exam, &children);
                if !issues.is_empty() {
                    return Err(Error::NotReady(issues));
                }
            }
            EntityStatus::Active => {
                let lagging: Vec<String> = sqlx::query_scalar(
                    "SELECT title FROM tests WHERE exam_id = $1 AND status NOT IN ('ready', 'active')",
                )
                .bind(exam_id)
                .fetch_all(&mut *tx)
                .await?;
                if !lagging.is_empty() {
                    let issues = lagging
                        .into_iter()
                        .map(|title| format!("test '{}' is not ready or active", title))
                        .collect();
                    return Err(Error::NotReady(issues));
                }
            }
            EntityStatus::Archived => {
                // archive cascades to every child test
                sqlx::query(
                    "UPDATE tests SET status = 'archived', updated_at = NOW() WHERE exam_id = $1 AND status <> 'archived'",
                )
                .bind(exam_id)
                .execute(&mut *tx)
                .await?;
            }
            EntityStatus::Draft => {
                // reopening clears the ready bit on all children
                sqlx::query(
                    "UPDATE tests SET status = 'draft', updated_at = NOW() WHERE exam_id = $1 AND status <> 'draft'",
                )
                .bind(exam_id)
                .execute(&mut *tx)
                .await?;
            }
        }

        let updated = sqlx::query_as::<_, Exam>(
            "UPDATE exams SET status = $2, updated_at = NOW() WHERE id = $1 RETURNING *",
        )
        .bind(exam_id)
        .bind(target)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        tracing::info!(exam_id = %exam_id, from = %exam.status, to = %target, "exam transitioned");
        Ok(updated)
    }
}
