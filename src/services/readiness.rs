use std::collections::HashSet;

use rust_decimal::Decimal;

use crate::models::exam::Exam;
use crate::models::question::{self, Question};
use crate::models::question_bank::QuestionBank;
use crate::models::quota::TestBankQuota;
use crate::models::test::Test;

/// A bank together with its questions in insertion order.
#[derive(Debug, Clone)]
pub struct BankPool {
    pub bank: QuestionBank,
    pub questions: Vec<Question>,
}

/// One quota row and the bank it points at. `pool` is `None` when the bank
/// has been deleted out from under the test.
#[derive(Debug, Clone)]
pub struct QuotaLink {
    pub quota: TestBankQuota,
    pub pool: Option<BankPool>,
}

#[derive(Debug, Clone)]
pub struct TestGraph {
    pub test: Test,
    pub links: Vec<QuotaLink>,
}

const SUPPORTED_TYPES: &[&str] = &[question::MCQ];

/// All composition issues of a test, collected rather than short-circuited
/// so authors see everything at once. Empty means ready.
pub fn test_issues(graph: &TestGraph) -> Vec<String> {
    let mut issues = Vec::new();

    if graph.links.is_empty() {
        issues.push("test has no question bank quotas".to_string());
    }

    for link in &graph.links {
        match &link.pool {
            None => issues.push(format!(
                "quota references missing bank {}",
                link.quota.bank_id
            )),
            Some(pool) => {
                if link.quota.requested_count as usize > pool.questions.len() {
                    issues.push(format!(
                        "quota bank={} requests {} but bank has {}",
                        pool.bank.name,
                        link.quota.requested_count,
                        pool.questions.len()
                    ));
                }
            }
        }
    }

    let mut checked_banks: HashSet<uuid::Uuid> = HashSet::new();
    for link in &graph.links {
        let Some(pool) = &link.pool else { continue };
        if !checked_banks.insert(pool.bank.id) {
            continue;
        }
        for q in &pool.questions {
            if !SUPPORTED_TYPES.contains(&q.question_type.as_str()) {
                issues.push(format!(
                    "bank={} question {} has unsupported type '{}'",
                    pool.bank.name, q.id, q.question_type
                ));
                continue;
            }
            let option_count = q.options.0.len();
            if option_count < question::MIN_OPTIONS || option_count > question::MAX_OPTIONS {
                issues.push(format!(
                    "bank={} question {} has {} options, expected between {} and {}",
                    pool.bank.name,
                    q.id,
                    option_count,
                    question::MIN_OPTIONS,
                    question::MAX_OPTIONS
                ));
            }
            let correct = q.options.0.iter().filter(|o| o.is_correct).count();
            if correct != 1 {
                issues.push(format!(
                    "bank={} question {} has {} correct options, expected exactly one",
                    pool.bank.name, q.id, correct
                ));
            }
        }
    }

    if let Some(total) = graph.test.total_questions {
        let sum: i32 = graph.links.iter().map(|l| l.quota.requested_count).sum();
        if sum != total {
            issues.push(format!(
                "total_questions is {} but quotas sum to {}",
                total, sum
            ));
        }
    }

    if graph.test.duration_minutes <= 0 {
        issues.push("duration_minutes must be positive".to_string());
    }
    let passing = graph.test.passing_score;
    if passing < Decimal::ZERO || passing > Decimal::from(100) {
        issues.push("passing_score must be between 0 and 100".to_string());
    }

    issues
}

/// Exam readiness: at least one child test, and every child composition-clean.
pub fn exam_issues(_exam: &Exam, children: &[TestGraph]) -> Vec<String> {
    let mut issues = Vec::new();

    if children.is_empty() {
        issues.push("exam has no tests".to_string());
    }

    for child in children {
        let child_issues = test_issues(child);
        if !child_issues.is_empty() {
            issues.push(format!(
                "test '{}' is not ready: {}",
                child.test.title,
                child_issues.join("; ")
            ));
        }
    }

    issues
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::question::QuestionOption;
    use crate::models::quota::SelectionMethod;
    use crate::models::status::EntityStatus;
    use crate::models::test::CompositionEntry;
    use chrono::Utc;
    use sqlx::types::Json;
    use uuid::Uuid;

    fn bank(name: &str) -> QuestionBank {
        QuestionBank {
            id: Uuid::new_v4(),
            name: name.to_string(),
            subject: "mathematics".to_string(),
            difficulty: "medium".to_string(),
            created_by: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn mcq(bank_id: Uuid, position: i32, option_count: usize) -> Question {
        let options = (0..option_count)
            .map(|i| QuestionOption {
                text: format!("option {i}"),
                is_correct: i == 0,
            })
            .collect();
        Question {
            id: Uuid::new_v4(),
            bank_id,
            position,
            prompt: format!("prompt {position}"),
            question_type: "mcq".to_string(),
            difficulty: "medium".to_string(),
            topic: None,
            explanation: None,
            verified: true,
            options: Json(options),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn test_row(total_questions: Option<i32>) -> Test {
        Test {
            id: Uuid::new_v4(),
            exam_id: Uuid::new_v4(),
            title: "Mock Paper".to_string(),
            duration_minutes: 30,
            passing_score: Decimal::from(50),
            total_questions,
            status: EntityStatus::Draft,
            composition: Json(Vec::<CompositionEntry>::new()),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn quota(test_id: Uuid, bank_id: Uuid, requested: i32) -> TestBankQuota {
        TestBankQuota {
            id: Uuid::new_v4(),
            test_id,
            bank_id,
            requested_count: requested,
            selection_method: SelectionMethod::Random,
            created_at: Utc::now(),
        }
    }

    fn graph_with(requested: i32, question_count: usize) -> TestGraph {
        let test = test_row(None);
        let b = bank("Quant Basics");
        let questions = (0..question_count)
            .map(|i| mcq(b.id, i as i32 + 1, 4))
            .collect();
        TestGraph {
            links: vec![QuotaLink {
                quota: quota(test.id, b.id, requested),
                pool: Some(BankPool { bank: b, questions }),
            }],
            test,
        }
    }

    #[test]
    fn clean_graph_has_no_issues() {
        assert!(test_issues(&graph_with(3, 5)).is_empty());
    }

    #[test]
    fn requested_count_equal_to_bank_size_is_ready() {
        assert!(test_issues(&graph_with(5, 5)).is_empty());
    }

    #[test]
    fn oversubscribed_quota_is_reported() {
        let issues = test_issues(&graph_with(6, 5));
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0], "quota bank=Quant Basics requests 6 but bank has 5");
    }

    #[test]
    fn missing_quotas_are_reported() {
        let graph = TestGraph {
            test: test_row(None),
            links: vec![],
        };
        assert_eq!(test_issues(&graph), vec!["test has no question bank quotas"]);
    }

    #[test]
    fn all_issues_are_collected_at_once() {
        let mut graph = graph_with(6, 5);
        graph.test.duration_minutes = 0;
        graph.test.total_questions = Some(10);
        let issues = test_issues(&graph);
        assert_eq!(issues.len(), 3);
    }

    #[test]
    fn option_invariant_violations_are_reported() {
        let test = test_row(None);
        let b = bank("English Usage");
        let mut q1 = mcq(b.id, 1, 1);
        q1.options.0[0].is_correct = true;
        let mut q2 = mcq(b.id, 2, 4);
        for o in q2.options.0.iter_mut() {
            o.is_correct = true;
        }
        let graph = TestGraph {
            links: vec![QuotaLink {
                quota: quota(test.id, b.id, 2),
                pool: Some(BankPool {
                    bank: b,
                    questions: vec![q1, q2],
                }),
            }],
            test,
        };
        let issues = test_issues(&graph);
        assert!(issues.iter().any(|i| i.contains("has 1 options")));
        assert!(issues.iter().any(|i| i.contains("4 correct options")));
    }

    #[test]
    fn unsupported_question_type_is_reported() {
        let mut graph = graph_with(1, 2);
        graph.links[0].pool.as_mut().unwrap().questions[1].question_type = "essay".to_string();
        let issues = test_issues(&graph);
        assert_eq!(issues.len(), 1);
        assert!(issues[0].contains("unsupported type 'essay'"));
    }

    #[test]
    fn total_questions_mismatch_is_reported() {
        let mut graph = graph_with(3, 5);
        graph.test.total_questions = Some(4);
        let issues = test_issues(&graph);
        assert_eq!(issues, vec!["total_questions is 4 but quotas sum to 3"]);
    }

    #[test]
    fn exam_requires_children() {
        let exam = Exam {
            id: Uuid::new_v4(),
            name: "IBPS Clerk".to_string(),
            category: "banking".to_string(),
            exam_type: "recruitment".to_string(),
            difficulty: "medium".to_string(),
            language: "en".to_string(),
            tags: vec![],
            status: EntityStatus::Draft,
            created_by: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert_eq!(exam_issues(&exam, &[]), vec!["exam has no tests"]);
        assert!(exam_issues(&exam, &[graph_with(3, 5)]).is_empty());

        let issues = exam_issues(&exam, &[graph_with(6, 5)]);
        assert_eq!(issues.len(), 1);
        assert!(issues[0].starts_with("test 'Mock Paper' is not ready"));
    }
}
