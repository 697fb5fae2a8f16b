use sqlx::PgPool;
use uuid::Uuid;

use crate::dto::catalog_dto::RelinkResponse;
use crate::error::{Error, Result};
use crate::models::question_bank::QuestionBank;
use crate::models::test::Test;

/// Subject keywords the fuzzy bank lookup is allowed to match on. Anything
/// outside this list must match exactly.
pub const SUBJECT_KEYWORDS: &[&str] = &[
    "mathematics",
    "reasoning",
    "english",
    "general knowledge",
    "computer",
    "science",
];

/// Exact name match first; otherwise a case-insensitive substring match,
/// but only through one of the known subject keywords.
pub fn match_bank<'a>(wanted: &str, banks: &'a [QuestionBank]) -> Option<&'a QuestionBank> {
    if let Some(bank) = banks.iter().find(|b| b.name == wanted) {
        return Some(bank);
    }

    let needle = wanted.to_lowercase();
    for keyword in SUBJECT_KEYWORDS {
        if needle.contains(keyword) {
            if let Some(bank) = banks
                .iter()
                .find(|b| b.name.to_lowercase().contains(keyword))
            {
                return Some(bank);
            }
        }
    }
    None
}

/// Rebuilds a test's quota rows from its preserved composition descriptor.
#[derive(Clone)]
pub struct RelinkService {
    pool: PgPool,
}

impl RelinkService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Replaces the quota rows of `test_id` from the descriptor. Missing
    /// banks are skipped and reported, never created or deleted. Running it
    /// twice over an unchanged descriptor yields identical rows.
    pub async fn relink(&self, test_id: Uuid) -> Result<RelinkResponse> {
        let mut tx = self.pool.begin().await?;

        let test = sqlx::query_as::<_, Test>("SELECT * FROM tests WHERE id = $1 FOR UPDATE")
            .bind(test_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| Error::NotFound("Test not found".to_string()))?;

        let banks = sqlx::query_as::<_, QuestionBank>(
            "SELECT * FROM question_banks ORDER BY name",
        )
        .fetch_all(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM test_bank_quotas WHERE test_id = $1")
            .bind(test_id)
            .execute(&mut *tx)
            .await?;

        let mut linked = 0usize;
        let mut skipped = Vec::new();
        for entry in &test.composition.0 {
            match match_bank(&entry.bank_name, &banks) {
                Some(bank) => {
                    sqlx::query(
                        r#"
                        INSERT INTO test_bank_quotas (test_id, bank_id, requested_count, selection_method)
                        VALUES ($1, $2, $3, $4)
                        "#,
                    )
                    .bind(test_id)
                    .bind(bank.id)
                    .bind(entry.requested_count)
                    .bind(entry.selection_method)
                    .execute(&mut *tx)
                    .await?;
                    linked += 1;
                }
                None => {
                    tracing::warn!(
                        test_id = %test_id,
                        bank_name = %entry.bank_name,
                        "relink skipped unknown bank"
                    );
                    skipped.push(entry.bank_name.clone());
                }
            }
        }

        tx.commit().await?;
        tracing::info!(test_id = %test_id, linked, skipped = skipped.len(), "test relinked");
        Ok(RelinkResponse { linked, skipped })
    }
}
