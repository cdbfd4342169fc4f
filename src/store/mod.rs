//! Persistence contracts consumed by the review engine.
//!
//! The engine never owns storage. It reads and writes through these traits,
//! which the host application implements over its database. [`memory`]
//! provides in-process implementations used by tests and small deployments.
//!
//! | Trait              | Owns                                          |
//! |--------------------|-----------------------------------------------|
//! | `EntityStore`      | Entity snapshots, target selection, tallies   |
//! | `VoteStore`        | Training votes and reviewer accuracy          |
//! | `ActivityLog`      | Append-only audit trail                       |
//! | `PermissionOracle` | Reviewer and admin roles                      |

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use warden_common::{
    ActivityFilter, ActivityLogEntry, Entity, EntityId, EntityKind, EntityStatus,
    ReasonKind, Reputation, ReviewerId, VoteAccuracy, VoteRecord,
};

use crate::errors::StoreError;
use crate::scheduler::SortOrder;

pub mod memory;

pub use memory::{MemoryActivityLog, MemoryPermissions, MemoryStore};

/// Entity persistence for one entity kind.
#[async_trait]
pub trait EntityStore<K: ReasonKind>: Send + Sync {
    /// Next candidate with `status`, ordered by `sort`, skipping `exclude`.
    /// Returns `StoreError::NoTargets` when nothing matches.
    async fn fetch_next(
        &self,
        sort: SortOrder,
        status: EntityStatus,
        exclude: &[EntityId],
    ) -> Result<Entity<K>, StoreError>;

    async fn get_by_id(&self, id: EntityId) -> Result<Entity<K>, StoreError>;

    /// Persist the engine-owned fields: reasons, confidence, status, and timestamps.
    async fn save(&self, entity: &Entity<K>) -> Result<(), StoreError>;

    async fn count_votes(&self, id: EntityId) -> Result<Reputation, StoreError>;
}

/// Training vote persistence.
#[async_trait]
pub trait VoteStore: Send + Sync {
    /// Record a vote, replacing any earlier vote by the same reviewer on the same entity.
    async fn record_vote(&self, vote: VoteRecord) -> Result<(), StoreError>;

    /// Accuracy over the reviewer's resolved training votes.
    async fn historical_accuracy(&self, reviewer_id: ReviewerId) -> Result<VoteAccuracy, StoreError>;

    /// Mark unresolved votes on an entity correct or incorrect once a binding
    /// decision is made. Returns the number of votes resolved.
    async fn resolve_votes(
        &self,
        kind: EntityKind,
        entity_id: EntityId,
        confirmed: bool,
    ) -> Result<usize, StoreError>;
}

/// Append-only activity log.
#[async_trait]
pub trait ActivityLog: Send + Sync {
    async fn append(&self, entry: ActivityLogEntry) -> Result<(), StoreError>;

    /// Matching entries, oldest first.
    async fn query(&self, filter: &ActivityFilter) -> Result<Vec<ActivityLogEntry>, StoreError>;

    /// Distinct reviewers who viewed the target at or after `since`, most recent first.
    async fn recent_viewers(
        &self,
        kind: EntityKind,
        target_id: EntityId,
        since: DateTime<Utc>,
    ) -> Result<Vec<ReviewerId>, StoreError> {
        let entries = self
            .query(&ActivityFilter::for_target(kind, target_id).since(since))
            .await?;
        Ok(distinct_viewers(&entries))
    }
}

/// Role lookups for reviewers.
pub trait PermissionOracle: Send + Sync {
    /// Holds the reviewer role required for binding (Standard mode) decisions.
    fn is_reviewer(&self, reviewer_id: ReviewerId) -> bool;

    fn is_admin(&self, reviewer_id: ReviewerId) -> bool;
}

pub(crate) fn distinct_viewers(entries: &[ActivityLogEntry]) -> Vec<ReviewerId> {
    let mut viewers = Vec::new();
    for entry in entries.iter().rev() {
        if entry.activity_type.is_view() && !viewers.contains(&entry.reviewer_id) {
            viewers.push(entry.reviewer_id);
        }
    }
    viewers
}
