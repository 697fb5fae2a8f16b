use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::dto::subscription_dto::SubscriptionView;
use crate::error::{Error, QuotaDimension, Result};
use crate::models::subscription::{Plan, Subscription, UNLIMITED};

/// Decides whether a candidate may start another attempt and consumes usage
/// when they may. Counters only ever change inside the caller's transaction,
/// so a failure later in `start_attempt` rolls them back.
pub struct EntitlementService;

impl EntitlementService {
    /// Pure admission decision over plan limits and current usage.
    pub fn admit(plan: &Plan, subscription: &Subscription, test_question_count: i32) -> Result<()> {
        if plan.max_tests != UNLIMITED && subscription.tests_used >= plan.max_tests {
            return Err(Error::QuotaExceeded(QuotaDimension::Tests));
        }
        if plan.max_questions != UNLIMITED
            && subscription.questions_used + test_question_count > plan.max_questions
        {
            return Err(Error::QuotaExceeded(QuotaDimension::Questions));
        }
        Ok(())
    }

    /// Resolves and row-locks the candidate's current subscription: the most
    /// recent `trial` or `active` one whose window contains `now`.
    pub async fn lock_current(
        conn: &mut PgConnection,
        candidate_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Subscription> {
        let subscription = sqlx::query_as::<_, Subscription>(
            r#"
            SELECT * FROM subscriptions
            WHERE candidate_id = $1
              AND status IN ('trial', 'active')
              AND starts_at <= $2 AND ends_at >= $2
            ORDER BY starts_at DESC
            LIMIT 1
            FOR UPDATE
            "#,
        )
        .bind(candidate_id)
        .bind(now)
        .fetch_optional(&mut *conn)
        .await?;

        subscription.ok_or(Error::NoEntitlement)
    }

    /// Checks limits against the locked subscription and increments usage.
    pub async fn consume(
        conn: &mut PgConnection,
        subscription: &Subscription,
        test_question_count: i32,
    ) -> Result<Subscription> {
        let plan = sqlx::query_as::<_, Plan>("SELECT * FROM plans WHERE id = $1")
            .bind(subscription.plan_id)
            .fetch_one(&mut *conn)
            .await?;

        Self::admit(&plan, subscription, test_question_count)?;

        let updated = sqlx::query_as::<_, Subscription>(
            r#"
            UPDATE subscriptions
            SET tests_used = tests_used + 1,
                questions_used = questions_used + $2,
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(subscription.id)
        .bind(test_question_count)
        .fetch_one(&mut *conn)
        .await?;

        Ok(updated)
    }

    /// Read-only view of the candidate's current subscription.
    pub async fn current_view(pool: &PgPool, candidate_id: Uuid) -> Result<SubscriptionView> {
        let now = Utc::now();
        let subscription = sqlx::query_as::<_, Subscription>(
            r#"
            SELECT * FROM subscriptions
            WHERE candidate_id = $1
              AND status IN ('trial', 'active')
              AND starts_at <= $2 AND ends_at >= $2
            ORDER BY starts_at DESC
            LIMIT 1
            "#,
        )
        .bind(candidate_id)
        .bind(now)
        .fetch_optional(pool)
        .await?
        .ok_or(Error::NoEntitlement)?;

        let plan = sqlx::query_as::<_, Plan>("SELECT * FROM plans WHERE id = $1")
            .bind(subscription.plan_id)
            .fetch_one(pool)
            .await?;

        Ok(SubscriptionView::new(&subscription, &plan))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::subscription::SubscriptionStatus;
    use chrono::Duration;

    fn plan(max_tests: i32, max_questions: i32) -> Plan {
        Plan {
            id: Uuid::new_v4(),
            name: "monthly".to_string(),
            max_tests,
            max_questions,
            price_cents: 49900,
            duration_days: 30,
            created_at: Utc::now(),
        }
    }

    fn subscription(plan_id: Uuid, tests_used: i32, questions_used: i32) -> Subscription {
        let now = Utc::now();
        Subscription {
            id: Uuid::new_v4(),
            candidate_id: Uuid::new_v4(),
            plan_id,
            status: SubscriptionStatus::Active,
            starts_at: now - Duration::days(1),
            ends_at: now + Duration::days(29),
            tests_used,
            questions_used,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn unlimited_plan_never_denies() {
        let p = plan(UNLIMITED, UNLIMITED);
        let s = subscription(p.id, 10_000, 1_000_000);
        assert!(EntitlementService::admit(&p, &s, 500).is_ok());
    }

    #[test]
    fn exhausted_test_quota_denies() {
        let p = plan(2, UNLIMITED);
        let s = subscription(p.id, 2, 0);
        match EntitlementService::admit(&p, &s, 10) {
            Err(Error::QuotaExceeded(QuotaDimension::Tests)) => {}
            other => panic!("expected QuotaExceeded(tests), got {other:?}"),
        }

        let s = subscription(p.id, 1, 0);
        assert!(EntitlementService::admit(&p, &s, 10).is_ok());
    }

    #[test]
    fn question_quota_counts_the_incoming_test() {
        let p = plan(UNLIMITED, 100);
        let s = subscription(p.id, 0, 95);
        assert!(EntitlementService::admit(&p, &s, 5).is_ok());
        match EntitlementService::admit(&p, &s, 6) {
            Err(Error::QuotaExceeded(QuotaDimension::Questions)) => {}
            other => panic!("expected QuotaExceeded(questions), got {other:?}"),
        }
    }
}
