//! Gates that can refuse a reviewer action.
//!
//! | Gate                      | Guards                                  |
//! |---------------------------|-----------------------------------------|
//! | [`ConsensusGate`]         | Binding decisions against community vote |
//! | [`FatigueThrottle`]       | Review rate per rolling session window  |
//! | [`VoteAccuracyGatekeeper`]| Training voters with poor accuracy      |
//!
//! Gates only inspect state. The session controller decides what a refusal
//! means and guarantees nothing is written once a gate says no.

pub mod accuracy;
pub mod consensus;
pub mod fatigue;

pub use accuracy::VoteAccuracyGatekeeper;
pub use consensus::{BindingDecision, ConsensusGate};
pub use fatigue::{FatigueState, FatigueThrottle};

/// Outcome of a gate check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    Allowed,
    Blocked { reason: String },
}

impl GateDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, GateDecision::Allowed)
    }
}
