//! Per-reviewer session state and the controller that drives it.
//!
//! A [`ReviewSession`] is an explicit context object owned by the caller and
//! passed into every [`SessionController`] call. The engine keeps no global
//! per-reviewer state; the caller serializes actions from the same reviewer.

pub mod controller;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use warden_common::{Entity, EntityStatus, ReasonKind, ReviewerId};

use crate::gates::{ConsensusGate, FatigueState, FatigueThrottle, VoteAccuracyGatekeeper};
use crate::review::{ReasonAggregator, ReviewHistory, history::DEFAULT_MAX_HISTORY_SIZE};
use crate::scheduler::SortOrder;

pub use controller::{DecisionOutcome, Presentation, PresentedTarget, SessionController};

/// Whether decisions are binding.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewMode {
    /// Decisions only record community votes.
    #[default]
    Training,
    /// Decisions change entity status.
    Standard,
}

impl fmt::Display for ReviewMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReviewMode::Training => write!(f, "training"),
            ReviewMode::Standard => write!(f, "standard"),
        }
    }
}

impl FromStr for ReviewMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "training" => Ok(ReviewMode::Training),
            "standard" => Ok(ReviewMode::Standard),
            _ => Err(format!(
                "Invalid review mode '{}'. Valid values: training, standard",
                s
            )),
        }
    }
}

/// Which entity status the session draws targets from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetMode {
    #[default]
    Flagged,
    Confirmed,
    Cleared,
}

impl TargetMode {
    pub fn status(self) -> EntityStatus {
        match self {
            TargetMode::Flagged => EntityStatus::Flagged,
            TargetMode::Confirmed => EntityStatus::Confirmed,
            TargetMode::Cleared => EntityStatus::Cleared,
        }
    }
}

impl fmt::Display for TargetMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.status())
    }
}

/// A reviewer's verdict on the active target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Confirm,
    Clear,
    Skip,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "reason")]
pub enum BlockReason {
    Break { until: DateTime<Utc> },
    Captcha,
    Banned,
}

impl fmt::Display for BlockReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockReason::Break { until } => write!(f, "on break until {}", until.to_rfc3339()),
            BlockReason::Captcha => write!(f, "verification required"),
            BlockReason::Banned => write!(f, "banned for inaccurate votes"),
        }
    }
}

/// What the presentation layer should show.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    NoTarget,
    Presenting,
    /// Presenting a target with unsaved reason edits.
    AwaitingDecision,
    Blocked(BlockReason),
}

/// Tunables for the controller and its gates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReviewSettings {
    pub max_history_size: usize,
    pub consensus: ConsensusGate,
    pub fatigue: FatigueThrottle,
    pub accuracy: VoteAccuracyGatekeeper,
    pub recent_viewer_window: Duration,
}

impl Default for ReviewSettings {
    fn default() -> Self {
        Self {
            max_history_size: DEFAULT_MAX_HISTORY_SIZE,
            consensus: ConsensusGate::default(),
            fatigue: FatigueThrottle::default(),
            accuracy: VoteAccuracyGatekeeper::default(),
            recent_viewer_window: Duration::minutes(5),
        }
    }
}

/// The target currently in front of the reviewer, with its edit state.
#[derive(Debug, Clone)]
pub(crate) struct ActiveTarget<K: ReasonKind> {
    pub(crate) entity: Entity<K>,
    pub(crate) reasons: ReasonAggregator<K>,
}

impl<K: ReasonKind> ActiveTarget<K> {
    pub(crate) fn new(entity: Entity<K>) -> Self {
        Self {
            entity,
            reasons: ReasonAggregator::new(),
        }
    }
}

/// Ephemeral per-reviewer state.
#[derive(Debug, Clone)]
pub struct ReviewSession<K: ReasonKind> {
    pub(crate) reviewer_id: ReviewerId,
    pub(crate) active: Option<ActiveTarget<K>>,
    pub(crate) history: ReviewHistory,
    pub(crate) sort: SortOrder,
    pub(crate) target_mode: TargetMode,
    pub(crate) mode: ReviewMode,
    pub(crate) fatigue: FatigueState,
    pub(crate) banned: bool,
    pub(crate) captcha_pending: bool,
}

impl<K: ReasonKind> ReviewSession<K> {
    pub(crate) fn new(
        reviewer_id: ReviewerId,
        mode: ReviewMode,
        max_history_size: usize,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            reviewer_id,
            active: None,
            history: ReviewHistory::new(max_history_size),
            sort: SortOrder::default(),
            target_mode: TargetMode::default(),
            mode,
            fatigue: FatigueState::new(now),
            banned: false,
            captcha_pending: false,
        }
    }

    pub fn reviewer_id(&self) -> ReviewerId {
        self.reviewer_id
    }

    pub fn mode(&self) -> ReviewMode {
        self.mode
    }

    pub fn target_mode(&self) -> TargetMode {
        self.target_mode
    }

    pub fn sort(&self) -> SortOrder {
        self.sort
    }

    pub fn history(&self) -> &ReviewHistory {
        &self.history
    }

    pub fn fatigue(&self) -> &FatigueState {
        &self.fatigue
    }

    pub fn is_banned(&self) -> bool {
        self.banned
    }

    /// The entity being reviewed, including any unsaved reason edits.
    pub fn active(&self) -> Option<&Entity<K>> {
        self.active.as_ref().map(|a| &a.entity)
    }

    pub fn has_unsaved_edits(&self) -> bool {
        self.active.as_ref().is_some_and(|a| a.reasons.is_modified())
    }

    /// State as of `now`.
    pub fn state_at(&self, now: DateTime<Utc>) -> SessionState {
        if let Some(until) = self.fatigue.break_until(now) {
            return SessionState::Blocked(BlockReason::Break { until });
        }
        if self.captcha_pending {
            return SessionState::Blocked(BlockReason::Captcha);
        }
        match &self.active {
            Some(active) if active.reasons.is_modified() => SessionState::AwaitingDecision,
            Some(_) => SessionState::Presenting,
            None if self.banned => SessionState::Blocked(BlockReason::Banned),
            None => SessionState::NoTarget,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use warden_common::{User, UserReasonType};

    fn session() -> ReviewSession<UserReasonType> {
        ReviewSession::new(1, ReviewMode::Standard, 10, Utc::now())
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!("Standard".parse::<ReviewMode>().unwrap(), ReviewMode::Standard);
        assert_eq!(" training ".parse::<ReviewMode>().unwrap(), ReviewMode::Training);
        assert!("binding".parse::<ReviewMode>().is_err());
    }

    #[test]
    fn test_target_mode_maps_to_status() {
        assert_eq!(TargetMode::Flagged.status(), EntityStatus::Flagged);
        assert_eq!(TargetMode::Confirmed.status(), EntityStatus::Confirmed);
        assert_eq!(TargetMode::Cleared.status(), EntityStatus::Cleared);
    }

    #[test]
    fn test_state_progression() {
        let now = Utc::now();
        let mut session = session();
        assert_eq!(session.state_at(now), SessionState::NoTarget);

        session.active = Some(ActiveTarget::new(User::new(5, "eve")));
        assert_eq!(session.state_at(now), SessionState::Presenting);

        if let Some(active) = session.active.as_mut() {
            active
                .reasons
                .upsert(&mut active.entity, UserReasonType::Chat, "spam", 0.4, vec![])
                .unwrap();
        }
        assert_eq!(session.state_at(now), SessionState::AwaitingDecision);
        assert!(session.has_unsaved_edits());
    }

    #[test]
    fn test_break_takes_precedence() {
        let now = Utc::now();
        let mut session = session();
        session.captcha_pending = true;
        session.fatigue.next_allowed_review_time = Some(now + Duration::minutes(1));
        assert!(matches!(
            session.state_at(now),
            SessionState::Blocked(BlockReason::Break { .. })
        ));
        assert_eq!(
            session.state_at(now + Duration::minutes(1)),
            SessionState::Blocked(BlockReason::Captcha)
        );
    }

    #[test]
    fn test_banned_without_target_is_blocked() {
        let mut session = session();
        session.banned = true;
        assert_eq!(
            session.state_at(Utc::now()),
            SessionState::Blocked(BlockReason::Banned)
        );
        // A banned reviewer navigating history still sees the target.
        session.active = Some(ActiveTarget::new(User::new(5, "eve")));
        assert_eq!(session.state_at(Utc::now()), SessionState::Presenting);
    }
}
