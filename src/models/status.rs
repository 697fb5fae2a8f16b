use serde::{Deserialize, Serialize};

/// Lifecycle of catalog entities (exams and tests). The status column is
/// written exclusively through `StatusService::transition`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "entity_status", rename_all = "snake_case")]
pub enum EntityStatus {
    Draft,
    Ready,
    Active,
    Archived,
}

impl EntityStatus {
    /// Legal edges: draft -> ready -> active -> archived -> draft.
    pub fn can_transition(self, target: EntityStatus) -> bool {
        use EntityStatus::*;
        matches!(
            (self, target),
            (Draft, Ready) | (Ready, Active) | (Active, Archived) | (Archived, Draft)
        )
    }

    pub fn check_transition(self, target: EntityStatus) -> crate::error::Result<()> {
        if self.can_transition(target) {
            Ok(())
        } else {
            Err(crate::error::Error::IllegalTransition {
                from: self,
                to: target,
            })
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EntityStatus::Draft => "draft",
            EntityStatus::Ready => "ready",
            EntityStatus::Active => "active",
            EntityStatus::Archived => "archived",
        }
    }
}

impl std::fmt::Display for EntityStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legal_edges_are_exactly_the_four_machine_edges() {
        use EntityStatus::*;
        let all = [Draft, Ready, Active, Archived];
        for from in all {
            for to in all {
                let legal = matches!(
                    (from, to),
                    (Draft, Ready) | (Ready, Active) | (Active, Archived) | (Archived, Draft)
                );
                assert_eq!(from.can_transition(to), legal, "{} -> {}", from, to);
            }
        }
    }

    #[test]
    fn illegal_transition_reports_both_endpoints() {
        let err = EntityStatus::Draft
            .check_transition(EntityStatus::Active)
            .unwrap_err();
        match err {
            crate::error::Error::IllegalTransition { from, to } => {
                assert_eq!(from, EntityStatus::Draft);
                assert_eq!(to, EntityStatus::Active);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
