use std::collections::HashSet;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::attempt::QuestionSnapshot;
use crate::models::question::{Difficulty, Question};
use crate::models::quota::{SelectionMethod, TestBankQuota};

/// One quota and the questions of its bank, in insertion order.
#[derive(Debug)]
pub struct QuotaPool<'a> {
    pub quota: &'a TestBankQuota,
    pub questions: &'a [Question],
}

/// Target difficulty split for `weighted_by_difficulty`, in percent.
/// Remainders and tier shortfalls are redistributed in ratio order
/// (medium, easy, hard), so the outcome is fully deterministic.
const EASY_SHARE: usize = 30;
const MEDIUM_SHARE: usize = 50;
const RATIO_ORDER: [usize; 3] = [1, 0, 2];

/// Materializes the concrete question list for one attempt.
///
/// Quotas are processed in ascending `(bank_id, quota_id)` order and selected
/// questions leave the shared pool before the next quota runs, so no question
/// appears twice. A quota that cannot be filled exactly from what remains
/// fails with `InsufficientPool` rather than under-filling.
///
/// Everything is driven by `seed`: the same test, seed and bank contents
/// produce byte-identical output.
pub fn materialize(pools: &[QuotaPool<'_>], seed: u64) -> Result<Vec<QuestionSnapshot>> {
    let mut order: Vec<&QuotaPool> = pools.iter().collect();
    order.sort_by_key(|p| (p.quota.bank_id, p.quota.id));

    let mut rng = StdRng::seed_from_u64(seed);
    let mut taken: HashSet<Uuid> = HashSet::new();
    let mut snapshots = Vec::new();

    for pool in order {
        let available: Vec<&Question> = pool
            .questions
            .iter()
            .filter(|q| !taken.contains(&q.id))
            .collect();
        let want = pool.quota.requested_count.max(0) as usize;
        if available.len() < want {
            return Err(Error::InsufficientPool(pool.quota.bank_id));
        }

        let picked: Vec<&Question> = match pool.quota.selection_method {
            SelectionMethod::Sequential => available[..want].to_vec(),
            SelectionMethod::Random => {
                available.choose_multiple(&mut rng, want).copied().collect()
            }
            SelectionMethod::WeightedByDifficulty => weighted_sample(&mut rng, &available, want),
        };

        for q in picked {
            taken.insert(q.id);
            snapshots.push(snapshot_question(q, seed)?);
        }
    }

    Ok(snapshots)
}

fn weighted_sample<'a>(rng: &mut StdRng, pool: &[&'a Question], want: usize) -> Vec<&'a Question> {
    let mut tiers: [Vec<&Question>; 3] = [Vec::new(), Vec::new(), Vec::new()];
    for q in pool {
        let tier = match Difficulty::parse(&q.difficulty) {
            Difficulty::Easy => 0,
            Difficulty::Medium => 1,
            Difficulty::Hard => 2,
        };
        tiers[tier].push(q);
    }

    let mut take = [
        want * EASY_SHARE / 100,
        want * MEDIUM_SHARE / 100,
        want * (100 - EASY_SHARE - MEDIUM_SHARE) / 100,
    ];
    let mut rem = want - take.iter().sum::<usize>();
    for &i in &RATIO_ORDER {
        if rem == 0 {
            break;
        }
        take[i] += 1;
        rem -= 1;
    }

    // A short tier hands its shortfall to the others; the caller guarantees
    // the pool as a whole can cover `want`.
    for i in 0..3 {
        take[i] = take[i].min(tiers[i].len());
    }
    let mut deficit = want - take.iter().sum::<usize>();
    while deficit > 0 {
        let mut progressed = false;
        for &i in &RATIO_ORDER {
            if deficit > 0 && take[i] < tiers[i].len() {
                take[i] += 1;
                deficit -= 1;
                progressed = true;
            }
        }
        if !progressed {
            break;
        }
    }

    let mut picked = Vec::with_capacity(want);
    for (tier, count) in tiers.iter().zip(take) {
        picked.extend(tier.choose_multiple(rng, count).copied());
    }
    picked
}

/// Freezes one question: options shuffled under `seed ^ question_id`, the
/// correct index recomputed against the shuffled order.
fn snapshot_question(q: &Question, seed: u64) -> Result<QuestionSnapshot> {
    let correct = q.correct_index().ok_or_else(|| {
        Error::Internal(format!("question {} violates the mcq option invariant", q.id))
    })?;

    let mut order: Vec<usize> = (0..q.options.0.len()).collect();
    let mut option_rng = StdRng::seed_from_u64(seed ^ fold_uuid(q.id));
    order.shuffle(&mut option_rng);

    let options = order
        .iter()
        .map(|&i| q.options.0[i].text.clone())
        .collect();
    let correct_index = order
        .iter()
        .position(|&i| i == correct)
        .ok_or_else(|| Error::Internal(format!("question {} lost its correct option", q.id)))?;

    Ok(QuestionSnapshot {
        id: q.id,
        prompt: q.prompt.clone(),
        options,
        correct_index: correct_index as i32,
    })
}

pub fn fold_uuid(id: Uuid) -> u64 {
    let bits = id.as_u128();
    (bits as u64) ^ ((bits >> 64) as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::question::QuestionOption;
    use chrono::Utc;
    use sqlx::types::Json;

    fn mcq(bank_id: Uuid, position: i32, difficulty: &str) -> Question {
        let options = (0..4)
            .map(|i| QuestionOption {
                text: format!("q{position} option {i}"),
                is_correct: i == 0,
            })
            .collect();
        Question {
            id: Uuid::new_v4(),
            bank_id,
            position,
            prompt: format!("prompt {position}"),
            question_type: "mcq".to_string(),
            difficulty: difficulty.to_string(),
            topic: None,
            explanation: None,
            verified: true,
            options: Json(options),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn quota(bank_id: Uuid, requested: i32, method: SelectionMethod) -> TestBankQuota {
        TestBankQuota {
            id: Uuid::new_v4(),
            test_id: Uuid::new_v4(),
            bank_id,
            requested_count: requested,
            selection_method: method,
            created_at: Utc::now(),
        }
    }

    fn bank_of(n: usize, bank_id: Uuid) -> Vec<Question> {
        (0..n).map(|i| mcq(bank_id, i as i32 + 1, "medium")).collect()
    }

    #[test]
    fn materialize_is_deterministic() {
        let bank_id = Uuid::new_v4();
        let questions = bank_of(10, bank_id);
        let q = quota(bank_id, 3, SelectionMethod::Random);
        let pools = [QuotaPool {
            quota: &q,
            questions: &questions,
        }];

        let a = materialize(&pools, 42).unwrap();
        let b = materialize(&pools, 42).unwrap();
        assert_eq!(
            serde_json::to_vec(&a).unwrap(),
            serde_json::to_vec(&b).unwrap()
        );

        let c = materialize(&pools, 43).unwrap();
        assert_ne!(
            serde_json::to_vec(&a).unwrap(),
            serde_json::to_vec(&c).unwrap()
        );
    }

    #[test]
    fn sequential_takes_bank_insertion_order() {
        let bank_id = Uuid::new_v4();
        let questions = bank_of(5, bank_id);
        let q = quota(bank_id, 3, SelectionMethod::Sequential);
        let pools = [QuotaPool {
            quota: &q,
            questions: &questions,
        }];

        let picked = materialize(&pools, 7).unwrap();
        let ids: Vec<Uuid> = picked.iter().map(|s| s.id).collect();
        let expected: Vec<Uuid> = questions[..3].iter().map(|q| q.id).collect();
        assert_eq!(ids, expected);
    }

    #[test]
    fn full_bank_quota_succeeds_and_overdraw_fails() {
        let bank_id = Uuid::new_v4();
        let questions = bank_of(5, bank_id);

        let exact = quota(bank_id, 5, SelectionMethod::Random);
        let pools = [QuotaPool {
            quota: &exact,
            questions: &questions,
        }];
        assert_eq!(materialize(&pools, 1).unwrap().len(), 5);

        let over = quota(bank_id, 6, SelectionMethod::Random);
        let pools = [QuotaPool {
            quota: &over,
            questions: &questions,
        }];
        match materialize(&pools, 1) {
            Err(Error::InsufficientPool(id)) => assert_eq!(id, bank_id),
            other => panic!("expected InsufficientPool, got {other:?}"),
        }
    }

    #[test]
    fn overlapping_quotas_deduplicate_and_fail_when_pool_runs_dry() {
        let bank_id = Uuid::new_v4();
        let questions = bank_of(5, bank_id);
        let q1 = quota(bank_id, 3, SelectionMethod::Random);
        let q2 = quota(bank_id, 3, SelectionMethod::Random);
        let pools = [
            QuotaPool {
                quota: &q1,
                questions: &questions,
            },
            QuotaPool {
                quota: &q2,
                questions: &questions,
            },
        ];

        match materialize(&pools, 99) {
            Err(Error::InsufficientPool(id)) => assert_eq!(id, bank_id),
            other => panic!("expected InsufficientPool, got {other:?}"),
        }

        // 3 + 2 fits: five distinct questions, no repeats.
        let q2 = quota(bank_id, 2, SelectionMethod::Random);
        let pools = [
            QuotaPool {
                quota: &q1,
                questions: &questions,
            },
            QuotaPool {
                quota: &q2,
                questions: &questions,
            },
        ];
        let picked = materialize(&pools, 99).unwrap();
        let ids: HashSet<Uuid> = picked.iter().map(|s| s.id).collect();
        assert_eq!(picked.len(), 5);
        assert_eq!(ids.len(), 5);
    }

    #[test]
    fn shuffled_options_keep_the_correct_text() {
        let bank_id = Uuid::new_v4();
        let questions = bank_of(10, bank_id);
        let q = quota(bank_id, 10, SelectionMethod::Sequential);
        let pools = [QuotaPool {
            quota: &q,
            questions: &questions,
        }];

        let picked = materialize(&pools, 1234).unwrap();
        for snapshot in &picked {
            let original = questions.iter().find(|q| q.id == snapshot.id).unwrap();
            let correct_text = &original.options.0[original.correct_index().unwrap()].text;
            assert_eq!(&snapshot.options[snapshot.correct_index as usize], correct_text);
            assert_eq!(snapshot.options.len(), original.options.0.len());
        }
    }

    #[test]
    fn weighted_split_follows_30_50_20() {
        let bank_id = Uuid::new_v4();
        let mut questions = Vec::new();
        for i in 0..10 {
            questions.push(mcq(bank_id, i, "easy"));
        }
        for i in 10..20 {
            questions.push(mcq(bank_id, i, "medium"));
        }
        for i in 20..30 {
            questions.push(mcq(bank_id, i, "hard"));
        }
        let q = quota(bank_id, 10, SelectionMethod::WeightedByDifficulty);
        let pools = [QuotaPool {
            quota: &q,
            questions: &questions,
        }];

        let picked = materialize(&pools, 5).unwrap();
        let tally = |d: &str| {
            picked
                .iter()
                .filter(|s| {
                    questions
                        .iter()
                        .find(|q| q.id == s.id)
                        .map(|q| q.difficulty == d)
                        .unwrap_or(false)
                })
                .count()
        };
        assert_eq!(tally("easy"), 3);
        assert_eq!(tally("medium"), 5);
        assert_eq!(tally("hard"), 2);
    }

    #[test]
    fn weighted_shortfall_spills_into_other_tiers() {
        let bank_id = Uuid::new_v4();
        let mut questions = Vec::new();
        for i in 0..10 {
            questions.push(mcq(bank_id, i, "medium"));
        }
        for i in 10..20 {
            questions.push(mcq(bank_id, i, "hard"));
        }
        let q = quota(bank_id, 10, SelectionMethod::WeightedByDifficulty);
        let pools = [QuotaPool {
            quota: &q,
            questions: &questions,
        }];

        let picked = materialize(&pools, 5).unwrap();
        assert_eq!(picked.len(), 10);
    }
}
