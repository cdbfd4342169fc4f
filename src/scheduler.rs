//! Target selection.
//!
//! [`TargetScheduler`] picks the next entity for a reviewer. It checks the
//! reviewer's vote accuracy before touching the entity store, so a banned
//! reviewer never causes a fetch. A fetched target is stamped with
//! `last_viewed` and a `Viewed` entry is dispatched.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use warden_common::{ActivityLogEntry, ActivityType, Entity, EntityId, EntityStatus, ReasonKind, ReviewerId};

use crate::audit::AuditDispatcher;
use crate::errors::ReviewError;
use crate::gates::VoteAccuracyGatekeeper;
use crate::store::{EntityStore, VoteStore};
use crate::util::Clock;

/// Candidate ordering for target selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    Random,
    /// Highest confidence first.
    #[default]
    Confidence,
    /// Least recently updated first.
    LastUpdated,
    /// Most recently updated first.
    RecentlyUpdated,
    /// Worst community standing first.
    Reputation,
    /// Never viewed, then least recently viewed, first.
    LastViewed,
}

impl SortOrder {
    pub const ALL: [SortOrder; 6] = [
        SortOrder::Random,
        SortOrder::Confidence,
        SortOrder::LastUpdated,
        SortOrder::RecentlyUpdated,
        SortOrder::Reputation,
        SortOrder::LastViewed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Random => "random",
            SortOrder::Confidence => "confidence",
            SortOrder::LastUpdated => "last_updated",
            SortOrder::RecentlyUpdated => "recently_updated",
            SortOrder::Reputation => "reputation",
            SortOrder::LastViewed => "last_viewed",
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        SortOrder::ALL
            .into_iter()
            .find(|order| order.as_str() == normalized)
            .ok_or_else(|| {
                format!(
                    "Invalid sort order '{}'. Valid values: {}",
                    s,
                    SortOrder::ALL.map(|o| o.as_str()).join(", ")
                )
            })
    }
}

/// Result of asking for the next target.
#[derive(Debug, Clone, PartialEq)]
pub enum Scheduled<K: ReasonKind> {
    Target(Entity<K>),
    /// The reviewer is banned; nothing was fetched.
    Banned,
}

pub struct TargetScheduler<K: ReasonKind> {
    entities: Arc<dyn EntityStore<K>>,
    votes: Arc<dyn VoteStore>,
    gatekeeper: VoteAccuracyGatekeeper,
    audit: AuditDispatcher,
    clock: Arc<dyn Clock>,
}

impl<K: ReasonKind> TargetScheduler<K> {
    pub fn new(
        entities: Arc<dyn EntityStore<K>>,
        votes: Arc<dyn VoteStore>,
        audit: AuditDispatcher,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            entities,
            votes,
            gatekeeper: VoteAccuracyGatekeeper::default(),
            audit,
            clock,
        }
    }

    pub fn with_gatekeeper(mut self, gatekeeper: VoteAccuracyGatekeeper) -> Self {
        self.gatekeeper = gatekeeper;
        self
    }

    pub fn gatekeeper(&self) -> &VoteAccuracyGatekeeper {
        &self.gatekeeper
    }

    /// Whether the reviewer is currently banned from training votes and new targets.
    pub async fn is_banned(&self, reviewer_id: ReviewerId) -> Result<bool, ReviewError> {
        Ok(self.gatekeeper.is_banned(self.votes.as_ref(), reviewer_id).await?)
    }

    /// Fetch the next target with `status`, skipping `exclude`.
    pub async fn next(
        &self,
        sort: SortOrder,
        status: EntityStatus,
        reviewer_id: ReviewerId,
        exclude: &[EntityId],
    ) -> Result<Scheduled<K>, ReviewError> {
        if self.is_banned(reviewer_id).await? {
            return Ok(Scheduled::Banned);
        }

        let mut entity = self.entities.fetch_next(sort, status, exclude).await?;
        tracing::debug!(
            reviewer_id,
            entity_id = entity.id,
            kind = %K::ENTITY_KIND,
            %sort,
            "Scheduled target"
        );
        self.mark_viewed(
            &mut entity,
            reviewer_id,
            ActivityType::Viewed,
            serde_json::json!({ "sort": sort, "status": status }),
        )
        .await?;
        Ok(Scheduled::Target(entity))
    }

    /// Stamp `last_viewed`, persist it, and dispatch a view entry.
    pub(crate) async fn mark_viewed(
        &self,
        entity: &mut Entity<K>,
        reviewer_id: ReviewerId,
        activity: ActivityType,
        details: serde_json::Value,
    ) -> Result<(), ReviewError> {
        let now = self.clock.now();
        entity.last_viewed = Some(now);
        self.entities.save(entity).await?;
        self.audit.dispatch(
            ActivityLogEntry::new(reviewer_id, activity, now)
                .with_target(K::ENTITY_KIND, entity.id)
                .with_details(details),
        );
        Ok(())
    }
}
