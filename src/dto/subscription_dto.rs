use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::subscription::{Plan, Subscription, SubscriptionStatus};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionView {
    pub id: Uuid,
    pub plan_name: String,
    pub status: SubscriptionStatus,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub tests_used: i32,
    pub max_tests: i32,
    pub questions_used: i32,
    pub max_questions: i32,
}

impl SubscriptionView {
    pub fn new(subscription: &Subscription, plan: &Plan) -> Self {
        Self {
            id: subscription.id,
            plan_name: plan.name.clone(),
            status: subscription.status,
            starts_at: subscription.starts_at,
            ends_at: subscription.ends_at,
            tests_used: subscription.tests_used,
            max_tests: plan.max_tests,
            questions_used: subscription.questions_used,
            max_questions: plan.max_questions,
        }
    }
}
