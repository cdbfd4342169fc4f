use crate::entity::EntityKind;
use crate::{EntityId, ReviewerId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Direction of a community vote on an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteDirection {
    /// Vouches for the entity (the flag is mistaken).
    Up,
    /// Agrees the entity is inappropriate.
    Down,
}

impl VoteDirection {
    /// Whether this vote agrees with a binding outcome.
    pub fn matches_outcome(self, confirmed: bool) -> bool {
        match self {
            VoteDirection::Down => confirmed,
            VoteDirection::Up => !confirmed,
        }
    }
}

/// One training vote by one reviewer on one entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoteRecord {
    pub reviewer_id: ReviewerId,
    pub entity_id: EntityId,
    pub entity_kind: EntityKind,
    pub direction: VoteDirection,
    pub is_training: bool,
    /// Set once a binding decision establishes ground truth.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_correct: Option<bool>,
    pub voted_at: DateTime<Utc>,
}

impl VoteRecord {
    pub fn training(
        reviewer_id: ReviewerId,
        entity_id: EntityId,
        entity_kind: EntityKind,
        direction: VoteDirection,
        voted_at: DateTime<Utc>,
    ) -> Self {
        Self {
            reviewer_id,
            entity_id,
            entity_kind,
            direction,
            is_training: true,
            is_correct: None,
            voted_at,
        }
    }
}

/// Resolved-vote accuracy for one reviewer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteAccuracy {
    pub correct: u32,
    pub total: u32,
}

impl VoteAccuracy {
    /// Fraction of resolved votes that were correct; 1.0 with no sample.
    pub fn ratio(&self) -> f64 {
        if self.total == 0 {
            1.0
        } else {
            f64::from(self.correct) / f64::from(self.total)
        }
    }
}
