use reqwest::Client;
use serde_json::Value as JsonValue;
use sqlx::{PgConnection, PgPool, Row};
use uuid::Uuid;

use crate::error::Result;
use crate::models::analytics_event::AnalyticsEvent;

/// Outbox for per-user analytics. Events are enqueued in the same
/// transaction as the state change they describe and delivered to the
/// analytics collaborator by a background worker.
#[derive(Clone)]
pub struct AnalyticsService {
    pool: PgPool,
    client: Client,
    target_url: String,
}

impl AnalyticsService {
    pub fn new(pool: PgPool, target_url: String) -> Self {
        Self {
            pool,
            client: Client::new(),
            target_url,
        }
    }

    /// Enqueue on an existing connection so the event commits or rolls back
    /// with the caller's transaction.
    pub async fn enqueue_on(
        conn: &mut PgConnection,
        event_type: &str,
        payload: &JsonValue,
    ) -> Result<AnalyticsEvent> {
        let target_url = crate::config::get_config().analytics_webhook_url.clone();
        let event = sqlx::query_as::<_, AnalyticsEvent>(
            r#"
            INSERT INTO analytics_events (event_type, payload, target_url, status)
            VALUES ($1, $2, $3, 'pending')
            RETURNING *
            "#,
        )
        .bind(event_type)
        .bind(payload)
        .bind(target_url)
        .fetch_one(&mut *conn)
        .await?;
        Ok(event)
    }

    pub async fn enqueue(&self, event_type: &str, payload: &JsonValue) -> Result<AnalyticsEvent> {
        let event = sqlx::query_as::<_, AnalyticsEvent>(
            r#"
            INSERT INTO analytics_events (event_type, payload, target_url, status)
            VALUES ($1, $2, $3, 'pending')
            RETURNING *
            "#,
        )
        .bind(event_type)
        .bind(payload)
        .bind(&self.target_url)
        .fetch_one(&self.pool)
        .await?;
        Ok(event)
    }

    pub async fn deliver_once(&self, event_id: Uuid) -> Result<()> {
        let event = sqlx::query_as::<_, AnalyticsEvent>(
            "SELECT * FROM analytics_events WHERE id = $1",
        )
        .bind(event_id)
        .fetch_one(&self.pool)
        .await?;

        let secret = crate::config::get_config().analytics_webhook_secret.clone();
        let res = self
            .client
            .post(&event.target_url)
            .header("X-Webhook-Secret", secret)
            .json(&event.payload)
            .send()
            .await;

        match res {
            Ok(resp) => {
                let status = resp.status().as_u16() as i32;
                let body = resp.text().await.unwrap_or_default();
                sqlx::query(
                    r#"
                    UPDATE analytics_events
                    SET http_status = $1, response_body = $2,
                        status = CASE WHEN $1 BETWEEN 200 AND 299 THEN 'success' ELSE 'failed' END,
                        attempts = attempts + 1, updated_at = NOW()
                    WHERE id = $3
                    "#,
                )
                .bind(status)
                .bind(body)
                .bind(event.id)
                .execute(&self.pool)
                .await?;
            }
            Err(err) => {
                sqlx::query(
                    r#"
                    UPDATE analytics_events
                    SET response_body = $1, status = 'failed',
                        attempts = attempts + 1, updated_at = NOW()
                    WHERE id = $2
                    "#,
                )
                .bind(format!("{}", err))
                .bind(event.id)
                .execute(&self.pool)
                .await?;
            }
        }
        Ok(())
    }

    /// Claims and delivers at most one pending event. Returns `true` when a
    /// row was claimed, so the worker loop can idle when the queue is empty.
    pub async fn run_once(&self) -> Result<bool> {
        let row_opt = sqlx::query(
            r#"
            SELECT id FROM analytics_events
            WHERE status = 'pending' AND (next_retry_at IS NULL OR next_retry_at <= NOW())
            ORDER BY created_at ASC
            FOR UPDATE SKIP LOCKED
            LIMIT 1
            "#,
        )
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row_opt else { return Ok(false) };
        let id: Uuid = row.try_get("id")?;

        let _ = self.deliver_once(id).await;

        let row = sqlx::query(
            "SELECT attempts, max_attempts, status FROM analytics_events WHERE id = $1",
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await?;
        let attempts: i32 = row.try_get("attempts")?;
        let max_attempts: i32 = row.try_get("max_attempts")?;
        let status: String = row.try_get("status")?;

        if status == "failed" && attempts < max_attempts {
            sqlx::query(
                r#"
                UPDATE analytics_events
                SET status = 'pending',
                    next_retry_at = NOW() + make_interval(secs => LEAST(3600, 30 * power(2::float, GREATEST(0, attempts - 1))::int))
                WHERE id = $1
                "#,
            )
            .bind(id)
            .execute(&self.pool)
            .await?;
        }

        Ok(true)
    }
}
