//! Bans training voters whose votes keep disagreeing with binding outcomes.

use warden_common::ReviewerId;

use crate::errors::StoreError;
use crate::store::VoteStore;

pub const DEFAULT_ACCURACY_FLOOR: f64 = 0.4;
pub const DEFAULT_MIN_SAMPLE_SIZE: u32 = 20;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VoteAccuracyGatekeeper {
    pub floor: f64,
    pub min_sample_size: u32,
}

impl Default for VoteAccuracyGatekeeper {
    fn default() -> Self {
        Self {
            floor: DEFAULT_ACCURACY_FLOOR,
            min_sample_size: DEFAULT_MIN_SAMPLE_SIZE,
        }
    }
}

impl VoteAccuracyGatekeeper {
    pub fn new(floor: f64, min_sample_size: u32) -> Self {
        Self {
            floor,
            min_sample_size,
        }
    }

    /// Whether the reviewer's resolved training votes fall under the floor.
    /// Reviewers with fewer than `min_sample_size` resolved votes are never banned.
    pub async fn is_banned<V: VoteStore + ?Sized>(
        &self,
        votes: &V,
        reviewer_id: ReviewerId,
    ) -> Result<bool, StoreError> {
        let accuracy = votes.historical_accuracy(reviewer_id).await?;
        let banned = accuracy.total >= self.min_sample_size && accuracy.ratio() < self.floor;
        if banned {
            tracing::warn!(
                reviewer_id,
                correct = accuracy.correct,
                total = accuracy.total,
                "Reviewer banned for low vote accuracy"
            );
        }
        Ok(banned)
    }
}
