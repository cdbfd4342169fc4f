//! The reviewer interaction lifecycle.
//!
//! ```text
//!  NoTarget ──present──▶ Presenting ──edit──▶ AwaitingDecision
//!     ▲                     │  ▲                    │
//!     │   confirm/clear/skip│  └──back/forward──────┤
//!     └─────────────────────┴───────────────────────┘
//!
//!  any ──▶ Blocked(Break | Captcha | Banned)
//! ```
//!
//! Gate order for a new target: break, verification, fatigue, accuracy ban.
//! Binding decisions check permission, reason presence and community
//! consensus before anything is written. Each transition dispatches exactly
//! one activity entry; the dispatch never delays or fails the transition.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use warden_common::{
    ActivityLogEntry, ActivityType, Entity, EntityId, EntityStatus, ReasonKind, ReviewerId,
    VoteDirection, VoteRecord,
};

use super::{
    ActiveTarget, BlockReason, Decision, ReviewMode, ReviewSession, ReviewSettings, SessionState,
    TargetMode,
};
use crate::audit::AuditDispatcher;
use crate::errors::ReviewError;
use crate::gates::{BindingDecision, ConsensusGate, FatigueThrottle, GateDecision};
use crate::review::{Direction, ReasonChange};
use crate::scheduler::{Scheduled, SortOrder, TargetScheduler};
use crate::store::{ActivityLog, EntityStore, PermissionOracle, VoteStore};
use crate::util::Clock;

/// A target shown to the reviewer, with other reviewers who recently viewed it.
#[derive(Debug, Clone, PartialEq)]
pub struct PresentedTarget<K: ReasonKind> {
    pub entity: Entity<K>,
    /// Advisory only. Never blocks an action.
    pub recent_viewers: Vec<ReviewerId>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Presentation<K: ReasonKind> {
    Target(PresentedTarget<K>),
    NothingToReview,
    Blocked(BlockReason),
}

impl<K: ReasonKind> Presentation<K> {
    pub fn target(&self) -> Option<&Entity<K>> {
        match self {
            Presentation::Target(presented) => Some(&presented.entity),
            _ => None,
        }
    }
}

/// Result of a decision on the active target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DecisionOutcome {
    pub entity_id: EntityId,
    pub decision: Decision,
    pub mode: ReviewMode,
    /// Earlier training votes marked correct or incorrect by this decision.
    pub resolved_votes: usize,
    pub overridden: bool,
    /// Other reviewers who viewed the target within the collision window.
    pub recent_viewers: Vec<ReviewerId>,
}

pub struct SessionController<K: ReasonKind> {
    entities: Arc<dyn EntityStore<K>>,
    votes: Arc<dyn VoteStore>,
    activity: Arc<dyn ActivityLog>,
    permissions: Arc<dyn PermissionOracle>,
    scheduler: TargetScheduler<K>,
    audit: AuditDispatcher,
    clock: Arc<dyn Clock>,
    settings: ReviewSettings,
}

impl<K: ReasonKind> SessionController<K> {
    pub fn new(
        entities: Arc<dyn EntityStore<K>>,
        votes: Arc<dyn VoteStore>,
        activity: Arc<dyn ActivityLog>,
        permissions: Arc<dyn PermissionOracle>,
        audit: AuditDispatcher,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let settings = ReviewSettings::default();
        let scheduler = TargetScheduler::new(
            Arc::clone(&entities),
            Arc::clone(&votes),
            audit.clone(),
            Arc::clone(&clock),
        )
        .with_gatekeeper(settings.accuracy);
        Self {
            entities,
            votes,
            activity,
            permissions,
            scheduler,
            audit,
            clock,
            settings,
        }
    }

    pub fn with_settings(mut self, settings: ReviewSettings) -> Self {
        self.scheduler = self.scheduler.with_gatekeeper(settings.accuracy);
        self.settings = settings;
        self
    }

    pub fn with_consensus(mut self, consensus: ConsensusGate) -> Self {
        self.settings.consensus = consensus;
        self
    }

    pub fn with_fatigue(mut self, fatigue: FatigueThrottle) -> Self {
        self.settings.fatigue = fatigue;
        self
    }

    pub fn settings(&self) -> &ReviewSettings {
        &self.settings
    }

    pub fn audit(&self) -> &AuditDispatcher {
        &self.audit
    }

    /// Open a session. Reviewers start in Standard mode, everyone else in Training.
    pub fn start_session(&self, reviewer_id: ReviewerId) -> ReviewSession<K> {
        let mode = if self.permissions.is_reviewer(reviewer_id) {
            ReviewMode::Standard
        } else {
            ReviewMode::Training
        };
        tracing::debug!(reviewer_id, %mode, kind = %K::ENTITY_KIND, "Review session started");
        ReviewSession::new(
            reviewer_id,
            mode,
            self.settings.max_history_size,
            self.clock.now(),
        )
    }

    pub fn state(&self, session: &ReviewSession<K>) -> SessionState {
        session.state_at(self.clock.now())
    }

    /// Show the active target, or fetch a new one.
    ///
    /// `verified` is the presentation layer's verification (captcha) result.
    pub async fn present(
        &self,
        session: &mut ReviewSession<K>,
        verified: bool,
    ) -> Result<Presentation<K>, ReviewError> {
        let now = self.clock.now();
        if let Some(until) = session.fatigue.break_until(now) {
            return Ok(Presentation::Blocked(BlockReason::Break { until }));
        }
        if !verified {
            session.captcha_pending = true;
            return Ok(Presentation::Blocked(BlockReason::Captcha));
        }
        session.captcha_pending = false;

        if let Some(active) = &session.active {
            let entity = active.entity.clone();
            let recent_viewers = self.recent_viewers(session.reviewer_id, entity.id).await;
            return Ok(Presentation::Target(PresentedTarget {
                entity,
                recent_viewers,
            }));
        }

        self.fetch_new(session, now).await
    }

    async fn fetch_new(
        &self,
        session: &mut ReviewSession<K>,
        now: DateTime<Utc>,
    ) -> Result<Presentation<K>, ReviewError> {
        if let Some(until) = self.count_review(session, now) {
            return Ok(Presentation::Blocked(BlockReason::Break { until }));
        }

        let scheduled = self
            .scheduler
            .next(
                session.sort,
                session.target_mode.status(),
                session.reviewer_id,
                session.history.ids(),
            )
            .await;

        match scheduled {
            Ok(Scheduled::Target(entity)) => {
                session.banned = false;
                Ok(Presentation::Target(self.activate(session, entity).await))
            }
            Ok(Scheduled::Banned) => {
                session.banned = true;
                Ok(Presentation::Blocked(BlockReason::Banned))
            }
            Err(ReviewError::NoTargets) => {
                tracing::debug!(reviewer_id = session.reviewer_id, "Nothing to review");
                Ok(Presentation::NothingToReview)
            }
            Err(e) => Err(e),
        }
    }

    /// Count one new target against the fatigue window. Returns the end of
    /// the break when this review starts one.
    fn count_review(&self, session: &mut ReviewSession<K>, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        if !self
            .settings
            .fatigue
            .check_and_advance(&mut session.fatigue, now)
        {
            return None;
        }
        let until = session.fatigue.next_allowed_review_time.unwrap_or(now);
        self.emit(
            session,
            ActivityType::BreakStarted,
            None,
            serde_json::json!({ "until": until }),
        );
        Some(until)
    }

    async fn activate(&self, session: &mut ReviewSession<K>, entity: Entity<K>) -> PresentedTarget<K> {
        session.history.push(entity.id);
        let recent_viewers = self.recent_viewers(session.reviewer_id, entity.id).await;
        session.active = Some(ActiveTarget::new(entity.clone()));
        PresentedTarget {
            entity,
            recent_viewers,
        }
    }

    /// Present a specific entity by id. Counts against the fatigue window
    /// like any other new target.
    pub async fn lookup(
        &self,
        session: &mut ReviewSession<K>,
        id: EntityId,
    ) -> Result<PresentedTarget<K>, ReviewError> {
        self.ensure_not_on_break(session)?;
        if let Some(until) = self.count_review(session, self.clock.now()) {
            return Err(ReviewError::BreakRequired { until });
        }
        if self.scheduler.is_banned(session.reviewer_id).await? {
            session.banned = true;
            return Err(ReviewError::Banned {
                reviewer_id: session.reviewer_id,
            });
        }

        let mut entity = self.entities.get_by_id(id).await?;
        self.scheduler
            .mark_viewed(
                &mut entity,
                session.reviewer_id,
                ActivityType::Viewed,
                serde_json::json!({ "lookup": true }),
            )
            .await?;
        Ok(self.activate(session, entity).await)
    }

    /// Apply a decision to the active target.
    ///
    /// Standard mode changes entity status; Training mode records a vote.
    pub async fn decide(
        &self,
        session: &mut ReviewSession<K>,
        decision: Decision,
    ) -> Result<DecisionOutcome, ReviewError> {
        self.ensure_not_on_break(session)?;
        let entity_id = session
            .active
            .as_ref()
            .map(|a| a.entity.id)
            .ok_or(ReviewError::NoActiveTarget)?;

        let binding = match decision {
            Decision::Skip => {
                session.active = None;
                self.emit(session, ActivityType::Skipped, Some(entity_id), serde_json::Value::Null);
                return Ok(DecisionOutcome {
                    entity_id,
                    decision,
                    mode: session.mode,
                    resolved_votes: 0,
                    overridden: false,
                    recent_viewers: Vec::new(),
                });
            }
            Decision::Confirm => BindingDecision::Confirm,
            Decision::Clear => BindingDecision::Clear,
        };

        match session.mode {
            ReviewMode::Standard => self.apply_binding(session, binding, false).await,
            ReviewMode::Training => self.record_training_vote(session, binding).await,
        }
    }

    /// Apply a binding decision past the consensus check. Admins only.
    pub async fn override_decision(
        &self,
        session: &mut ReviewSession<K>,
        decision: BindingDecision,
    ) -> Result<DecisionOutcome, ReviewError> {
        self.ensure_not_on_break(session)?;
        if session.active.is_none() {
            return Err(ReviewError::NoActiveTarget);
        }
        if !self.permissions.is_admin(session.reviewer_id) {
            return Err(ReviewError::PermissionDenied {
                action: "overriding community consensus",
                required: "admin",
            });
        }
        self.apply_binding(session, decision, true).await
    }

    async fn apply_binding(
        &self,
        session: &mut ReviewSession<K>,
        decision: BindingDecision,
        overridden: bool,
    ) -> Result<DecisionOutcome, ReviewError> {
        let reviewer_id = session.reviewer_id;
        if !self.permissions.is_reviewer(reviewer_id) {
            return Err(ReviewError::PermissionDenied {
                action: "binding decisions",
                required: "reviewer",
            });
        }
        let mut entity = session
            .active
            .as_ref()
            .map(|a| a.entity.clone())
            .ok_or(ReviewError::NoActiveTarget)?;

        if decision == BindingDecision::Confirm && entity.reasons.is_empty() {
            return Err(ReviewError::validation(
                "reasons",
                "confirming requires at least one reason",
            ));
        }

        if !overridden {
            let reputation = self.entities.count_votes(entity.id).await?;
            if let GateDecision::Blocked { reason } = self.settings.consensus.allow(decision, reputation) {
                tracing::info!(reviewer_id, entity_id = entity.id, %decision, %reason, "Decision blocked by consensus");
                return Err(ReviewError::ConsensusBlocked { reason });
            }
        }

        let recent_viewers = self.recent_viewers(reviewer_id, entity.id).await;
        let now = self.clock.now();
        let confirmed = decision == BindingDecision::Confirm;
        if confirmed {
            entity.status = EntityStatus::Confirmed;
            entity.verified_at = Some(now);
        } else {
            entity.status = EntityStatus::Cleared;
            entity.cleared_at = Some(now);
        }
        entity.last_updated = now;
        self.entities.save(&entity).await?;

        let resolved_votes = match self
            .votes
            .resolve_votes(K::ENTITY_KIND, entity.id, confirmed)
            .await
        {
            Ok(n) => n,
            Err(e) => {
                tracing::warn!(entity_id = entity.id, error = %e, "Failed to resolve training votes");
                0
            }
        };

        tracing::info!(
            reviewer_id,
            entity_id = entity.id,
            kind = %K::ENTITY_KIND,
            %decision,
            overridden,
            resolved_votes,
            "Binding decision applied"
        );

        session.active = None;
        let (activity, details) = if overridden {
            (
                ActivityType::ConsensusOverride,
                serde_json::json!({ "decision": decision, "confidence": entity.confidence }),
            )
        } else if confirmed {
            (
                ActivityType::Confirmed,
                serde_json::json!({ "confidence": entity.confidence, "reasons": entity.reasons.len() }),
            )
        } else {
            (ActivityType::Cleared, serde_json::Value::Null)
        };
        self.emit(session, activity, Some(entity.id), details);

        Ok(DecisionOutcome {
            entity_id: entity.id,
            decision: if confirmed {
                Decision::Confirm
            } else {
                Decision::Clear
            },
            mode: ReviewMode::Standard,
            resolved_votes,
            overridden,
            recent_viewers,
        })
    }

    async fn record_training_vote(
        &self,
        session: &mut ReviewSession<K>,
        decision: BindingDecision,
    ) -> Result<DecisionOutcome, ReviewError> {
        let reviewer_id = session.reviewer_id;
        if self.scheduler.is_banned(reviewer_id).await? {
            session.banned = true;
            return Err(ReviewError::Banned { reviewer_id });
        }
        let entity_id = session
            .active
            .as_ref()
            .map(|a| a.entity.id)
            .ok_or(ReviewError::NoActiveTarget)?;

        let (direction, activity, outcome) = match decision {
            BindingDecision::Confirm => (VoteDirection::Down, ActivityType::TrainingDownvote, Decision::Confirm),
            BindingDecision::Clear => (VoteDirection::Up, ActivityType::TrainingUpvote, Decision::Clear),
        };
        let recent_viewers = self.recent_viewers(reviewer_id, entity_id).await;
        self.votes
            .record_vote(VoteRecord::training(
                reviewer_id,
                entity_id,
                K::ENTITY_KIND,
                direction,
                self.clock.now(),
            ))
            .await?;
        tracing::debug!(reviewer_id, entity_id, ?direction, "Training vote recorded");

        session.active = None;
        self.emit(session, activity, Some(entity_id), serde_json::Value::Null);
        Ok(DecisionOutcome {
            entity_id,
            decision: outcome,
            mode: ReviewMode::Training,
            resolved_votes: 0,
            overridden: false,
            recent_viewers,
        })
    }

    /// Step back through history. `None` when already at the oldest entry.
    ///
    /// Allowed while banned; unsaved edits on the active target are discarded.
    pub async fn navigate_back(
        &self,
        session: &mut ReviewSession<K>,
    ) -> Result<Option<PresentedTarget<K>>, ReviewError> {
        self.ensure_not_on_break(session)?;
        if session.history.index() <= 0 {
            return Ok(None);
        }
        match session
            .history
            .navigate(Direction::Back, self.entities.as_ref())
            .await?
        {
            Some(entity) => Ok(Some(
                self.show_from_history(session, entity, ActivityType::NavigatedBack)
                    .await?,
            )),
            None => Ok(None),
        }
    }

    /// Step forward through history. Past the newest entry this skips the
    /// active target and fetches a new one.
    pub async fn navigate_forward(
        &self,
        session: &mut ReviewSession<K>,
        verified: bool,
    ) -> Result<Presentation<K>, ReviewError> {
        self.ensure_not_on_break(session)?;
        if !session.history.is_at_end()
            && let Some(entity) = session
                .history
                .navigate(Direction::Forward, self.entities.as_ref())
                .await?
        {
            let presented = self
                .show_from_history(session, entity, ActivityType::NavigatedForward)
                .await?;
            return Ok(Presentation::Target(presented));
        }

        if session.active.is_some() {
            self.decide(session, Decision::Skip).await?;
        }
        self.present(session, verified).await
    }

    async fn show_from_history(
        &self,
        session: &mut ReviewSession<K>,
        mut entity: Entity<K>,
        activity: ActivityType,
    ) -> Result<PresentedTarget<K>, ReviewError> {
        self.scheduler
            .mark_viewed(&mut entity, session.reviewer_id, activity, serde_json::Value::Null)
            .await?;
        let recent_viewers = self.recent_viewers(session.reviewer_id, entity.id).await;
        session.active = Some(ActiveTarget::new(entity.clone()));
        Ok(PresentedTarget {
            entity,
            recent_viewers,
        })
    }

    /// Add, replace, or (with an empty message) remove a reason on the active target.
    pub async fn edit_reason(
        &self,
        session: &mut ReviewSession<K>,
        kind: K,
        message: &str,
        confidence: f64,
        evidence: Vec<String>,
    ) -> Result<ReasonChange, ReviewError> {
        self.ensure_can_edit(session)?;
        let active = session.active.as_mut().ok_or(ReviewError::NoActiveTarget)?;
        let change = active
            .reasons
            .upsert(&mut active.entity, kind, message, confidence, evidence)?;
        let entity_id = active.entity.id;
        let aggregate = active.entity.confidence;

        if change != ReasonChange::Unchanged {
            self.emit(
                session,
                ActivityType::ReasonUpdated,
                Some(entity_id),
                serde_json::json!({
                    "reason_type": kind,
                    "change": change,
                    "confidence": aggregate,
                }),
            );
        }
        Ok(change)
    }

    /// Remove a reason from the active target. Returns whether it was present.
    pub async fn remove_reason(
        &self,
        session: &mut ReviewSession<K>,
        kind: K,
    ) -> Result<bool, ReviewError> {
        self.edit_reason(session, kind, "", 0.0, Vec::new())
            .await
            .map(|change| change == ReasonChange::Removed)
    }

    /// Undo every reason edit since the active target was presented.
    pub async fn restore_reasons(&self, session: &mut ReviewSession<K>) -> Result<bool, ReviewError> {
        let active = session.active.as_mut().ok_or(ReviewError::NoActiveTarget)?;
        let restored = active.reasons.restore(&mut active.entity);
        let entity_id = active.entity.id;
        if restored {
            self.emit(session, ActivityType::ReasonsRestored, Some(entity_id), serde_json::Value::Null);
        }
        Ok(restored)
    }

    /// Switch review mode. Standard is silently downgraded to Training for
    /// reviewers without the role. Returns the mode now in effect.
    pub fn switch_mode(&self, session: &mut ReviewSession<K>, requested: ReviewMode) -> ReviewMode {
        let effective = match requested {
            ReviewMode::Standard if !self.permissions.is_reviewer(session.reviewer_id) => {
                tracing::debug!(reviewer_id = session.reviewer_id, "Standard mode unavailable, staying in training");
                ReviewMode::Training
            }
            other => other,
        };
        if effective != session.mode {
            let from = session.mode;
            session.mode = effective;
            let target = session.active.as_ref().map(|a| a.entity.id);
            self.emit(
                session,
                ActivityType::ModeSwitched,
                target,
                serde_json::json!({ "from": from, "to": effective }),
            );
        }
        effective
    }

    /// Change which entity status targets are drawn from. The active target is dropped.
    pub fn set_target_mode(&self, session: &mut ReviewSession<K>, target_mode: TargetMode) {
        if target_mode == session.target_mode {
            return;
        }
        let from = session.target_mode;
        session.target_mode = target_mode;
        let dropped = session.active.take().map(|a| a.entity.id);
        self.emit(
            session,
            ActivityType::TargetModeChanged,
            dropped,
            serde_json::json!({ "from": from, "to": target_mode }),
        );
    }

    pub fn set_sort(&self, session: &mut ReviewSession<K>, sort: SortOrder) {
        session.sort = sort;
    }

    fn ensure_not_on_break(&self, session: &ReviewSession<K>) -> Result<(), ReviewError> {
        match session.fatigue.break_until(self.clock.now()) {
            Some(until) => Err(ReviewError::BreakRequired { until }),
            None => Ok(()),
        }
    }

    fn ensure_can_edit(&self, session: &ReviewSession<K>) -> Result<(), ReviewError> {
        self.ensure_not_on_break(session)?;
        if session.mode != ReviewMode::Standard || !self.permissions.is_reviewer(session.reviewer_id) {
            return Err(ReviewError::PermissionDenied {
                action: "editing reasons",
                required: "reviewer",
            });
        }
        Ok(())
    }

    /// Other reviewers who viewed the target inside the collision window.
    /// Lookup failures only lose the warning.
    async fn recent_viewers(&self, reviewer_id: ReviewerId, target_id: EntityId) -> Vec<ReviewerId> {
        let now = self.clock.now();
        let since = now
            .checked_sub_signed(self.settings.recent_viewer_window)
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        match self
            .activity
            .recent_viewers(K::ENTITY_KIND, target_id, since)
            .await
        {
            Ok(viewers) => viewers.into_iter().filter(|v| *v != reviewer_id).collect(),
            Err(e) => {
                tracing::warn!(target_id, error = %e, "Recent viewer lookup failed");
                Vec::new()
            }
        }
    }

    fn emit(
        &self,
        session: &ReviewSession<K>,
        activity: ActivityType,
        target: Option<EntityId>,
        details: serde_json::Value,
    ) {
        let mut entry = ActivityLogEntry::new(session.reviewer_id, activity, self.clock.now())
            .with_details(details);
        if let Some(id) = target {
            entry = entry.with_target(K::ENTITY_KIND, id);
        }
        self.audit.dispatch(entry);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryActivityLog, MemoryPermissions, MemoryStore};
    use crate::util::ManualClock;
    use chrono::Duration;
    use warden_common::{Reason, User, UserReasonType};

    const REVIEWER: ReviewerId = 10;
    const VOLUNTEER: ReviewerId = 20;
    const ADMIN: ReviewerId = 30;

    struct Harness {
        store: Arc<MemoryStore<UserReasonType>>,
        log: Arc<MemoryActivityLog>,
        clock: Arc<ManualClock>,
        controller: SessionController<UserReasonType>,
    }

    impl Harness {
        async fn entries(&self) -> Vec<ActivityLogEntry> {
            self.controller.audit().flush().await;
            self.log.entries()
        }
    }

    fn flagged(id: EntityId, confidence: f64) -> User {
        let mut user = User::new(id, format!("user{id}"));
        user.reasons
            .insert(UserReasonType::Profile, Reason::new("inappropriate bio", confidence));
        user.confidence = confidence;
        user
    }

    fn harness(users: Vec<User>) -> Harness {
        let store = Arc::new(MemoryStore::with_entities(users));
        let log = Arc::new(MemoryActivityLog::new());
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let permissions = Arc::new(
            MemoryPermissions::new()
                .with_reviewer(REVIEWER)
                .with_admin(ADMIN),
        );
        let audit = AuditDispatcher::spawn(log.clone(), 256);
        let controller = SessionController::new(
            store.clone(),
            store.clone(),
            log.clone(),
            permissions,
            audit,
            clock.clone(),
        );
        Harness {
            store,
            log,
            clock,
            controller,
        }
    }

    #[tokio::test]
    async fn test_start_session_picks_mode_from_role() {
        let h = harness(vec![]);
        assert_eq!(h.controller.start_session(REVIEWER).mode(), ReviewMode::Standard);
        assert_eq!(h.controller.start_session(VOLUNTEER).mode(), ReviewMode::Training);
    }

    #[tokio::test]
    async fn test_present_then_confirm() {
        let h = harness(vec![flagged(1, 0.9), flagged(2, 0.3)]);
        let mut session = h.controller.start_session(REVIEWER);

        let presentation = h.controller.present(&mut session, true).await.unwrap();
        assert_eq!(presentation.target().map(|e| e.id), Some(1));
        assert_eq!(h.controller.state(&session), SessionState::Presenting);

        let outcome = h.controller.decide(&mut session, Decision::Confirm).await.unwrap();
        assert_eq!(outcome.entity_id, 1);
        assert_eq!(outcome.mode, ReviewMode::Standard);
        assert_eq!(h.controller.state(&session), SessionState::NoTarget);

        let stored = h.store.snapshot(1).unwrap();
        assert_eq!(stored.status, EntityStatus::Confirmed);
        assert_eq!(stored.verified_at, Some(h.clock.now()));

        let kinds: Vec<ActivityType> = h.entries().await.iter().map(|e| e.activity_type).collect();
        assert_eq!(kinds, vec![ActivityType::Viewed, ActivityType::Confirmed]);
    }

    #[tokio::test]
    async fn test_captcha_blocks_before_fetch() {
        let h = harness(vec![flagged(1, 0.9)]);
        let mut session = h.controller.start_session(REVIEWER);

        let presentation = h.controller.present(&mut session, false).await.unwrap();
        assert_eq!(presentation, Presentation::Blocked(BlockReason::Captcha));
        assert_eq!(
            h.controller.state(&session),
            SessionState::Blocked(BlockReason::Captcha)
        );
        assert!(h.store.snapshot(1).unwrap().last_viewed.is_none());

        h.controller.present(&mut session, true).await.unwrap();
        assert_eq!(h.controller.state(&session), SessionState::Presenting);
    }

    #[tokio::test]
    async fn test_consensus_blocks_without_writing() {
        let h = harness(vec![flagged(1, 0.9).with_reputation(90, 10)]);
        let controller = h.controller.with_consensus(ConsensusGate::new(50, 0.8));
        let mut session = controller.start_session(REVIEWER);
        controller.present(&mut session, true).await.unwrap();

        let err = controller.decide(&mut session, Decision::Confirm).await.unwrap_err();
        assert!(matches!(err, ReviewError::ConsensusBlocked { .. }));
        assert_eq!(h.store.snapshot(1).unwrap().status, EntityStatus::Flagged);
        assert_eq!(controller.state(&session), SessionState::Presenting);

        let outcome = controller.decide(&mut session, Decision::Clear).await.unwrap();
        assert_eq!(outcome.decision, Decision::Clear);
        assert_eq!(h.store.snapshot(1).unwrap().status, EntityStatus::Cleared);
    }

    #[tokio::test]
    async fn test_admin_override_bypasses_consensus() {
        let h = harness(vec![flagged(1, 0.9).with_reputation(90, 10)]);
        let controller = h.controller.with_consensus(ConsensusGate::new(50, 0.8));

        let mut reviewer = controller.start_session(REVIEWER);
        controller.present(&mut reviewer, true).await.unwrap();
        let err = controller
            .override_decision(&mut reviewer, BindingDecision::Confirm)
            .await
            .unwrap_err();
        assert!(matches!(err, ReviewError::PermissionDenied { required: "admin", .. }));
        controller.audit().flush().await;

        let mut admin = controller.start_session(ADMIN);
        controller.lookup(&mut admin, 1).await.unwrap();
        let outcome = controller
            .override_decision(&mut admin, BindingDecision::Confirm)
            .await
            .unwrap();
        assert!(outcome.overridden);
        assert_eq!(outcome.recent_viewers, vec![REVIEWER]);
        assert_eq!(h.store.snapshot(1).unwrap().status, EntityStatus::Confirmed);

        controller.audit().flush().await;
        let overrides = h
            .log
            .entries()
            .into_iter()
            .filter(|e| e.activity_type == ActivityType::ConsensusOverride)
            .count();
        assert_eq!(overrides, 1);
    }

    #[tokio::test]
    async fn test_confirm_without_reasons_is_rejected() {
        let h = harness(vec![User::new(1, "bare")]);
        let mut session = h.controller.start_session(REVIEWER);
        h.controller.present(&mut session, true).await.unwrap();

        let err = h.controller.decide(&mut session, Decision::Confirm).await.unwrap_err();
        assert!(matches!(err, ReviewError::Validation { field: "reasons", .. }));
        assert_eq!(h.store.snapshot(1).unwrap().status, EntityStatus::Flagged);
    }

    #[tokio::test]
    async fn test_training_votes_record_direction() {
        let h = harness(vec![flagged(1, 0.9), flagged(2, 0.5)]);
        let mut session = h.controller.start_session(VOLUNTEER);

        h.controller.present(&mut session, true).await.unwrap();
        let outcome = h.controller.decide(&mut session, Decision::Confirm).await.unwrap();
        assert_eq!(outcome.mode, ReviewMode::Training);

        h.controller.present(&mut session, true).await.unwrap();
        h.controller.decide(&mut session, Decision::Clear).await.unwrap();

        assert_eq!(h.store.snapshot(1).unwrap().reputation.downvotes, 1);
        assert_eq!(h.store.snapshot(2).unwrap().reputation.upvotes, 1);
        assert_eq!(h.store.snapshot(1).unwrap().status, EntityStatus::Flagged);

        let kinds: Vec<ActivityType> = h.entries().await.iter().map(|e| e.activity_type).collect();
        assert_eq!(
            kinds,
            vec![
                ActivityType::Viewed,
                ActivityType::TrainingDownvote,
                ActivityType::Viewed,
                ActivityType::TrainingUpvote,
            ]
        );
    }

    #[tokio::test]
    async fn test_binding_decision_resolves_training_votes() {
        let h = harness(vec![flagged(1, 0.9)]);
        let mut volunteer = h.controller.start_session(VOLUNTEER);
        h.controller.lookup(&mut volunteer, 1).await.unwrap();
        h.controller.decide(&mut volunteer, Decision::Clear).await.unwrap();

        let mut reviewer = h.controller.start_session(REVIEWER);
        h.controller.lookup(&mut reviewer, 1).await.unwrap();
        let outcome = h.controller.decide(&mut reviewer, Decision::Confirm).await.unwrap();
        assert_eq!(outcome.resolved_votes, 1);
        assert_eq!(h.store.votes()[0].is_correct, Some(false));
    }

    #[tokio::test]
    async fn test_non_reviewer_cannot_switch_to_standard() {
        let h = harness(vec![flagged(1, 0.9)]);
        let mut session = h.controller.start_session(VOLUNTEER);
        assert_eq!(
            h.controller.switch_mode(&mut session, ReviewMode::Standard),
            ReviewMode::Training
        );
        assert!(h.entries().await.is_empty());

        let mut reviewer = h.controller.start_session(REVIEWER);
        h.controller.switch_mode(&mut reviewer, ReviewMode::Training);
        h.controller.switch_mode(&mut reviewer, ReviewMode::Training);
        let kinds: Vec<ActivityType> = h.entries().await.iter().map(|e| e.activity_type).collect();
        assert_eq!(kinds, vec![ActivityType::ModeSwitched]);
    }

    #[tokio::test]
    async fn test_reason_edits_and_restore() {
        let h = harness(vec![flagged(1, 0.5)]);
        let mut session = h.controller.start_session(REVIEWER);
        h.controller.present(&mut session, true).await.unwrap();

        h.controller
            .edit_reason(&mut session, UserReasonType::Chat, "asks for pics", 0.5, vec![])
            .await
            .unwrap();
        assert_eq!(session.active().unwrap().confidence, 0.75);
        assert_eq!(h.controller.state(&session), SessionState::AwaitingDecision);

        assert!(h.controller.restore_reasons(&mut session).await.unwrap());
        assert_eq!(session.active().unwrap().confidence, 0.5);
        assert_eq!(h.controller.state(&session), SessionState::Presenting);

        let kinds: Vec<ActivityType> = h.entries().await.iter().map(|e| e.activity_type).collect();
        assert_eq!(
            kinds,
            vec![
                ActivityType::Viewed,
                ActivityType::ReasonUpdated,
                ActivityType::ReasonsRestored
            ]
        );
    }

    #[tokio::test]
    async fn test_training_mode_cannot_edit_reasons() {
        let h = harness(vec![flagged(1, 0.5)]);
        let mut session = h.controller.start_session(VOLUNTEER);
        h.controller.present(&mut session, true).await.unwrap();
        let err = h
            .controller
            .edit_reason(&mut session, UserReasonType::Chat, "x", 0.5, vec![])
            .await
            .unwrap_err();
        assert!(matches!(err, ReviewError::PermissionDenied { .. }));
    }

    #[tokio::test]
    async fn test_edited_reasons_are_saved_on_confirm() {
        let h = harness(vec![flagged(1, 0.5)]);
        let mut session = h.controller.start_session(REVIEWER);
        h.controller.present(&mut session, true).await.unwrap();
        h.controller
            .edit_reason(&mut session, UserReasonType::Outfit, "outfit", 0.5, vec!["img1".into()])
            .await
            .unwrap();
        h.controller.decide(&mut session, Decision::Confirm).await.unwrap();

        let stored = h.store.snapshot(1).unwrap();
        assert_eq!(stored.confidence, 0.75);
        assert!(stored.reasons.contains(UserReasonType::Outfit));
    }

    #[tokio::test]
    async fn test_fatigue_break_blocks_and_expires() {
        let users = (1..=5).map(|id| flagged(id, 0.5)).collect();
        let h = harness(users);
        let controller = h.controller.with_fatigue(FatigueThrottle::new(
            2,
            Duration::hours(1),
            Duration::minutes(15),
        ));
        let mut session = controller.start_session(REVIEWER);

        for _ in 0..2 {
            controller.present(&mut session, true).await.unwrap();
            controller.decide(&mut session, Decision::Skip).await.unwrap();
        }
        let blocked = controller.present(&mut session, true).await.unwrap();
        let Presentation::Blocked(BlockReason::Break { until }) = blocked else {
            panic!("Expected a break, got {blocked:?}");
        };

        h.clock.set(until - Duration::milliseconds(1));
        assert!(matches!(
            controller.present(&mut session, true).await.unwrap(),
            Presentation::Blocked(BlockReason::Break { .. })
        ));
        assert!(matches!(
            controller.navigate_back(&mut session).await,
            Err(ReviewError::BreakRequired { .. })
        ));

        h.clock.set(until);
        let presentation = controller.present(&mut session, true).await.unwrap();
        assert!(presentation.target().is_some());
    }

    #[tokio::test]
    async fn test_lookups_count_toward_fatigue() {
        let users = (1..=5).map(|id| flagged(id, 0.5)).collect();
        let h = harness(users);
        let controller = h.controller.with_fatigue(FatigueThrottle::new(
            1,
            Duration::hours(1),
            Duration::minutes(15),
        ));
        let mut session = controller.start_session(REVIEWER);

        controller.present(&mut session, true).await.unwrap();
        controller.decide(&mut session, Decision::Clear).await.unwrap();

        let err = controller.lookup(&mut session, 2).await.unwrap_err();
        let ReviewError::BreakRequired { until } = err else {
            panic!("Expected a break, got {err:?}");
        };
        assert!(session.active().is_none());
        assert_eq!(h.store.snapshot(2).unwrap().status, EntityStatus::Flagged);
        assert!(h.store.snapshot(2).unwrap().last_viewed.is_none());
        assert!(matches!(
            controller.lookup(&mut session, 3).await,
            Err(ReviewError::BreakRequired { .. })
        ));

        controller.audit().flush().await;
        let breaks = h
            .log
            .entries()
            .iter()
            .filter(|e| e.activity_type == ActivityType::BreakStarted)
            .count();
        assert_eq!(breaks, 1);

        h.clock.set(until);
        let presented = controller.lookup(&mut session, 2).await.unwrap();
        assert_eq!(presented.entity.id, 2);
    }

    #[tokio::test]
    async fn test_oversized_viewer_window_does_not_overflow() {
        let h = harness(vec![flagged(1, 0.5)]);
        let settings = ReviewSettings {
            recent_viewer_window: Duration::MAX,
            ..ReviewSettings::default()
        };
        let controller = h.controller.with_settings(settings);
        let mut session = controller.start_session(REVIEWER);

        let presentation = controller.present(&mut session, true).await.unwrap();
        assert_eq!(presentation.target().map(|e| e.id), Some(1));
        controller.decide(&mut session, Decision::Confirm).await.unwrap();
    }

    #[tokio::test]
    async fn test_set_target_mode_drops_active_target() {
        let h = harness(vec![
            flagged(1, 0.5),
            flagged(2, 0.5).with_status(EntityStatus::Confirmed),
        ]);
        let mut session = h.controller.start_session(REVIEWER);
        h.controller.present(&mut session, true).await.unwrap();

        h.controller.set_target_mode(&mut session, TargetMode::Confirmed);
        assert!(session.active().is_none());

        let presentation = h.controller.present(&mut session, true).await.unwrap();
        assert_eq!(presentation.target().map(|e| e.id), Some(2));

        let changed = h
            .entries()
            .await
            .into_iter()
            .find(|e| e.activity_type == ActivityType::TargetModeChanged)
            .unwrap();
        assert_eq!(changed.target_id, Some(1));
    }

    #[tokio::test]
    async fn test_decide_without_target() {
        let h = harness(vec![]);
        let mut session = h.controller.start_session(REVIEWER);
        assert!(matches!(
            h.controller.present(&mut session, true).await.unwrap(),
            Presentation::NothingToReview
        ));
        assert!(matches!(
            h.controller.decide(&mut session, Decision::Skip).await,
            Err(ReviewError::NoActiveTarget)
        ));
    }
}
