//! Community-consensus check for binding decisions.

use serde::{Deserialize, Serialize};
use warden_common::Reputation;

use super::GateDecision;

pub const DEFAULT_MINIMUM_VOTES_REQUIRED: u32 = 10;
pub const DEFAULT_VOTE_CONSENSUS_THRESHOLD: f64 = 0.8;

/// A decision that changes entity status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BindingDecision {
    Confirm,
    Clear,
}

impl std::fmt::Display for BindingDecision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BindingDecision::Confirm => write!(f, "confirm"),
            BindingDecision::Clear => write!(f, "clear"),
        }
    }
}

/// Blocks a binding decision once enough votes exist and a large enough share
/// of them oppose it.
///
/// Upvotes vouch for the entity, so they oppose Confirm; downvotes oppose Clear.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConsensusGate {
    pub minimum_votes_required: u32,
    pub vote_consensus_threshold: f64,
}

impl Default for ConsensusGate {
    fn default() -> Self {
        Self {
            minimum_votes_required: DEFAULT_MINIMUM_VOTES_REQUIRED,
            vote_consensus_threshold: DEFAULT_VOTE_CONSENSUS_THRESHOLD,
        }
    }
}

impl ConsensusGate {
    pub fn new(minimum_votes_required: u32, vote_consensus_threshold: f64) -> Self {
        Self {
            minimum_votes_required,
            vote_consensus_threshold,
        }
    }

    pub fn allow(&self, decision: BindingDecision, reputation: Reputation) -> GateDecision {
        let total = reputation.total();
        if total == 0 || total < self.minimum_votes_required {
            return GateDecision::Allowed;
        }

        let opposing = match decision {
            BindingDecision::Confirm => reputation.upvotes,
            BindingDecision::Clear => reputation.downvotes,
        };
        let share = f64::from(opposing) / f64::from(total);
        tracing::debug!(
            %decision,
            upvotes = reputation.upvotes,
            downvotes = reputation.downvotes,
            share,
            "Consensus check"
        );

        if share >= self.vote_consensus_threshold {
            let side = match decision {
                BindingDecision::Confirm => "vouch for",
                BindingDecision::Clear => "report",
            };
            GateDecision::Blocked {
                reason: format!(
                    "{:.0}% of {} community votes {} this entity",
                    share * 100.0,
                    total,
                    side
                ),
            }
        } else {
            GateDecision::Allowed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strong_opposition_blocks_confirm_but_not_clear() {
        let gate = ConsensusGate::new(50, 0.8);
        let reputation = Reputation::new(90, 10);

        let confirm = gate.allow(BindingDecision::Confirm, reputation);
        match confirm {
            GateDecision::Blocked { reason } => {
                assert!(reason.contains("90%"));
                assert!(reason.contains("100"));
            }
            GateDecision::Allowed => panic!("Expected Confirm to be blocked"),
        }
        assert!(gate.allow(BindingDecision::Clear, reputation).is_allowed());
    }

    #[test]
    fn test_noop_below_minimum_votes() {
        let gate = ConsensusGate::new(50, 0.8);
        let reputation = Reputation::new(49, 0);
        assert!(gate.allow(BindingDecision::Confirm, reputation).is_allowed());
        assert!(gate.allow(BindingDecision::Clear, Reputation::new(0, 49)).is_allowed());
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let gate = ConsensusGate::new(10, 0.8);
        assert!(!gate.allow(BindingDecision::Clear, Reputation::new(2, 8)).is_allowed());
        assert!(gate.allow(BindingDecision::Clear, Reputation::new(3, 7)).is_allowed());
    }

    #[test]
    fn test_zero_minimum_with_no_votes_allows() {
        let gate = ConsensusGate::new(0, 0.5);
        assert!(gate.allow(BindingDecision::Confirm, Reputation::default()).is_allowed());
    }
}
