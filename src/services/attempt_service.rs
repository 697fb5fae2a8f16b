use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde_json::json;
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::dto::attempt_dto::AttemptView;
use crate::error::{Error, Result};
use crate::models::attempt::{Attempt, AttemptSnapshot, AttemptStatus};
use crate::models::status::EntityStatus;
use crate::models::test::Test;
use crate::services::analytics_service::AnalyticsService;
use crate::services::catalog_service::load_test_graph;
use crate::services::entitlement_service::EntitlementService;
use crate::services::selector::{self, QuotaPool};

/// Percent of snapshot questions answered correctly, one decimal place.
/// Grades strictly against the stored snapshot; the live bank plays no part.
pub fn grade(snapshot: &AttemptSnapshot, answers: &BTreeMap<Uuid, i32>) -> Decimal {
    let total = snapshot.questions.len();
    if total == 0 {
        return Decimal::ZERO;
    }
    let correct = snapshot
        .questions
        .iter()
        .filter(|q| answers.get(&q.id) == Some(&q.correct_index))
        .count();
    (Decimal::from(correct as i64 * 100) / Decimal::from(total as i64)).round_dp(1)
}

#[derive(Clone)]
pub struct AttemptService {
    pool: PgPool,
}

impl AttemptService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Starts an attempt for `candidate_id` on `test_id`.
    ///
    /// Idempotent per candidate and test: a live in-progress attempt is
    /// returned unchanged. Entitlement increments, the selector run and the
    /// attempt insert share one transaction, so a selector failure rolls the
    /// usage counters back.
    pub async fn start_attempt(&self, candidate_id: Uuid, test_id: Uuid) -> Result<Attempt> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let existing = sqlx::query_as::<_, Attempt>(
            r#"
            SELECT * FROM attempts
            WHERE candidate_id = $1 AND test_id = $2 AND status = 'in_progress'
            ORDER BY started_at DESC
            LIMIT 1
            FOR UPDATE
            "#,
        )
        .bind(candidate_id)
        .bind(test_id)
        .fetch_optional(&mut *tx)
        .await?;

        if let Some(existing) = existing {
            if now <= existing.deadline {
                tx.commit().await?;
                return Ok(existing);
            }
            // overdue attempt found on the way in: finalize it, then a fresh
            // attempt may be started below
            Self::finalize(&mut tx, existing, AttemptStatus::Expired, now).await?;
        }

        // lock order is subscription first, then test
        let subscription = EntitlementService::lock_current(&mut tx, candidate_id, now).await?;

        let test = sqlx::query_as::<_, Test>("SELECT * FROM tests WHERE id = $1 FOR UPDATE")
            .bind(test_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| Error::NotFound("Test not found".to_string()))?;
        if test.status != EntityStatus::Active {
            return Err(Error::NotActive);
        }

        let duration_minutes = test.duration_minutes;
        let graph = load_test_graph(&mut tx, test).await?;
        let question_count: i32 = graph.links.iter().map(|l| l.quota.requested_count).sum();

        EntitlementService::consume(&mut tx, &subscription, question_count).await?;

        let mut pools = Vec::with_capacity(graph.links.len());
        for link in &graph.links {
            let pool = link
                .pool
                .as_ref()
                .ok_or(Error::InsufficientPool(link.quota.bank_id))?;
            pools.push(QuotaPool {
                quota: &link.quota,
                questions: &pool.questions,
            });
        }

        let seed: u64 = rand::thread_rng().gen();
        let questions = selector::materialize(&pools, seed)?;
        let snapshot = AttemptSnapshot { seed, questions };

        let attempt = sqlx::query_as::<_, Attempt>(
            r#"
            INSERT INTO attempts (candidate_id, test_id, seed, snapshot, started_at, deadline)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(candidate_id)
        .bind(test_id)
        .bind(seed as i64)
        .bind(Json(&snapshot))
        .bind(now)
        .bind(now + Duration::minutes(duration_minutes as i64))
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        tracing::info!(
            attempt_id = %attempt.id,
            candidate_id = %candidate_id,
            test_id = %test_id,
            questions = snapshot.questions.len(),
            "attempt started"
        );
        Ok(attempt)
    }

    /// Fetches an attempt, expiring it first when its deadline has passed.
    pub async fn get_attempt(&self, attempt_id: Uuid) -> Result<Attempt> {
        let attempt = sqlx::query_as::<_, Attempt>("SELECT * FROM attempts WHERE id = $1")
            .bind(attempt_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| Error::NotFound("Attempt not found".to_string()))?;

        if attempt.status == AttemptStatus::InProgress && Utc::now() > attempt.deadline {
            return self.expire(attempt_id).await;
        }
        Ok(attempt)
    }

    async fn expire(&self, attempt_id: Uuid) -> Result<Attempt> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;
        let attempt = sqlx::query_as::<_, Attempt>("SELECT * FROM attempts WHERE id = $1 FOR UPDATE")
            .bind(attempt_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| Error::NotFound("Attempt not found".to_string()))?;

        // someone else may have finalized it while we waited for the lock
        let attempt = if attempt.status == AttemptStatus::InProgress && now > attempt.deadline {
            Self::finalize(&mut tx, attempt, AttemptStatus::Expired, now).await?
        } else {
            attempt
        };
        tx.commit().await?;
        Ok(attempt)
    }

    pub async fn record_answer(
        &self,
        attempt_id: Uuid,
        candidate_id: Uuid,
        question_id: Uuid,
        selected_option_index: i32,
    ) -> Result<Attempt> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let mut attempt =
            sqlx::query_as::<_, Attempt>("SELECT * FROM attempts WHERE id = $1 FOR UPDATE")
                .bind(attempt_id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or_else(|| Error::NotFound("Attempt not found".to_string()))?;

        if attempt.candidate_id != candidate_id {
            return Err(Error::Forbidden(
                "Attempt belongs to another candidate".to_string(),
            ));
        }
        if attempt.status.is_terminal() {
            return Err(Error::AttemptFrozen {
                attempt: Box::new(AttemptView::from(&attempt)),
            });
        }
        if now > attempt.deadline {
            let finalized = Self::finalize(&mut tx, attempt, AttemptStatus::Expired, now).await?;
            tx.commit().await?;
            return Err(Error::Expired {
                attempt: Box::new(AttemptView::from(&finalized)),
            });
        }

        let question = attempt
            .snapshot
            .0
            .questions
            .iter()
            .find(|q| q.id == question_id)
            .ok_or(Error::UnknownQuestion(question_id))?;
        if selected_option_index < 0 || selected_option_index as usize >= question.options.len() {
            return Err(Error::BadRequest(format!(
                "selected_option_index {} is out of range for question {}",
                selected_option_index, question_id
            )));
        }

        attempt.answers.0.insert(question_id, selected_option_index);
        let updated = sqlx::query_as::<_, Attempt>(
            "UPDATE attempts SET answers = $2, updated_at = NOW() WHERE id = $1 RETURNING *",
        )
        .bind(attempt.id)
        .bind(Json(&attempt.answers.0))
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(updated)
    }

    /// Grades and finalizes. Submitting a terminal attempt returns the
    /// stored result unchanged.
    pub async fn submit_attempt(&self, attempt_id: Uuid, candidate_id: Uuid) -> Result<Attempt> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let attempt =
            sqlx::query_as::<_, Attempt>("SELECT * FROM attempts WHERE id = $1 FOR UPDATE")
                .bind(attempt_id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or_else(|| Error::NotFound("Attempt not found".to_string()))?;

        if attempt.candidate_id != candidate_id {
            return Err(Error::Forbidden(
                "Attempt belongs to another candidate".to_string(),
            ));
        }
        if attempt.status.is_terminal() {
            tx.commit().await?;
            return Ok(attempt);
        }

        let terminal = if now > attempt.deadline {
            AttemptStatus::Expired
        } else {
            AttemptStatus::Submitted
        };
        let finalized = Self::finalize(&mut tx, attempt, terminal, now).await?;
        tx.commit().await?;
        Ok(finalized)
    }

    /// Proactive expiry for dashboards. Each overdue row is claimed and
    /// re-verified under its own lock, so concurrent sweeps are safe.
    pub async fn sweep_expired(&self, batch_size: i64) -> Result<u64> {
        let ids: Vec<Uuid> = sqlx::query_scalar(
            r#"
            SELECT id FROM attempts
            WHERE status = 'in_progress' AND deadline < NOW()
            ORDER BY deadline ASC
            LIMIT $1
            "#,
        )
        .bind(batch_size)
        .fetch_all(&self.pool)
        .await?;

        let mut swept = 0u64;
        for id in ids {
            let now = Utc::now();
            let mut tx = self.pool.begin().await?;
            let attempt = sqlx::query_as::<_, Attempt>(
                "SELECT * FROM attempts WHERE id = $1 AND status = 'in_progress' FOR UPDATE SKIP LOCKED",
            )
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;

            let Some(attempt) = attempt else { continue };
            if now > attempt.deadline {
                Self::finalize(&mut tx, attempt, AttemptStatus::Expired, now).await?;
                tx.commit().await?;
                swept += 1;
            }
        }

        if swept > 0 {
            tracing::info!(swept, "expired attempts finalized");
        }
        Ok(swept)
    }

    /// Writes the terminal state and enqueues the analytics event on the
    /// caller's transaction. Expects the attempt row to be locked.
    async fn finalize(
        tx: &mut Transaction<'_, Postgres>,
        attempt: Attempt,
        terminal: AttemptStatus,
        now: DateTime<Utc>,
    ) -> Result<Attempt> {
        let passing_score: Decimal =
            sqlx::query_scalar("SELECT passing_score FROM tests WHERE id = $1")
                .bind(attempt.test_id)
                .fetch_one(&mut **tx)
                .await?;

        let score = grade(&attempt.snapshot.0, &attempt.answers.0);
        let passed = score >= passing_score;

        let updated = sqlx::query_as::<_, Attempt>(
            r#"
            UPDATE attempts
            SET status = $2, submitted_at = $3, score = $4, passed = $5, updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(attempt.id)
        .bind(terminal)
        .bind(now)
        .bind(score)
        .bind(passed)
        .fetch_one(&mut **tx)
        .await?;

        let payload = json!({
            "event": "attempt_finalized",
            "attempt_id": updated.id,
            "candidate_id": updated.candidate_id,
            "test_id": updated.test_id,
            "score": score.to_f64().unwrap_or(0.0),
            "passed": passed,
            "terminal_status": terminal,
        });
        AnalyticsService::enqueue_on(&mut **tx, "attempt_finalized", &payload).await?;

        tracing::info!(
            attempt_id = %updated.id,
            status = %terminal,
            score = %score,
            passed,
            "attempt finalized"
        );
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::attempt::QuestionSnapshot;

    fn snapshot(correct_indices: &[i32]) -> AttemptSnapshot {
        AttemptSnapshot {
            seed: 42,
            questions: correct_indices
                .iter()
                .enumerate()
                .map(|(i, &correct)| QuestionSnapshot {
                    id: Uuid::new_v4(),
                    prompt: format!("q{i}"),
                    options: vec!["a".into(), "b".into(), "c".into(), "d".into()],
                    correct_index: correct,
                })
                .collect(),
        }
    }

    #[test]
    fn all_correct_scores_one_hundred() {
        let snap = snapshot(&[0, 1, 2]);
        let answers: BTreeMap<Uuid, i32> = snap
            .questions
            .iter()
            .map(|q| (q.id, q.correct_index))
            .collect();
        assert_eq!(grade(&snap, &answers), Decimal::new(1000, 1));
    }

    #[test]
    fn one_of_three_rounds_to_33_3() {
        let snap = snapshot(&[0, 0, 0]);
        let mut answers = BTreeMap::new();
        answers.insert(snap.questions[0].id, 0);
        assert_eq!(grade(&snap, &answers), Decimal::new(333, 1));
    }

    #[test]
    fn unanswered_questions_score_zero() {
        let snap = snapshot(&[0, 1]);
        let answers = BTreeMap::new();
        assert_eq!(grade(&snap, &answers), Decimal::ZERO);
    }

    #[test]
    fn wrong_answers_do_not_count() {
        let snap = snapshot(&[2, 2]);
        let mut answers = BTreeMap::new();
        answers.insert(snap.questions[0].id, 2);
        answers.insert(snap.questions[1].id, 1);
        assert_eq!(grade(&snap, &answers), Decimal::new(500, 1));
    }
}
