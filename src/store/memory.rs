//! In-process store implementations.
//!
//! All state sits behind `std::sync::Mutex` and no lock is held across an
//! await point. `set_unavailable` simulates an outage so callers can exercise
//! their transient-error paths.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use warden_common::{
    ActivityFilter, ActivityLogEntry, Entity, EntityId, EntityKind, EntityStatus, ReasonKind,
    Reputation, ReviewerId, VoteAccuracy, VoteDirection, VoteRecord,
};

use super::{ActivityLog, EntityStore, PermissionOracle, VoteStore};
use crate::errors::StoreError;
use crate::scheduler::SortOrder;

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, StoreError> {
    mutex.lock().map_err(|_| StoreError::LockPoisoned)
}

/// Entity and vote store for one entity kind.
pub struct MemoryStore<K: ReasonKind> {
    entities: Mutex<BTreeMap<EntityId, Entity<K>>>,
    votes: Mutex<Vec<VoteRecord>>,
    unavailable: AtomicBool,
}

impl<K: ReasonKind> Default for MemoryStore<K> {
    fn default() -> Self {
        Self {
            entities: Mutex::new(BTreeMap::new()),
            votes: Mutex::new(Vec::new()),
            unavailable: AtomicBool::new(false),
        }
    }
}

impl<K: ReasonKind> MemoryStore<K> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entities(entities: impl IntoIterator<Item = Entity<K>>) -> Self {
        let store = Self::new();
        if let Ok(mut map) = store.entities.lock() {
            map.extend(entities.into_iter().map(|e| (e.id, e)));
        }
        store
    }

    /// Insert or fully replace an entity, bypassing the engine's field rules.
    pub fn insert(&self, entity: Entity<K>) -> Result<(), StoreError> {
        lock(&self.entities)?.insert(entity.id, entity);
        Ok(())
    }

    /// Hard-delete an entity so later lookups fail with `NotFound`.
    pub fn delete(&self, id: EntityId) -> Result<Option<Entity<K>>, StoreError> {
        Ok(lock(&self.entities)?.remove(&id))
    }

    /// Snapshot of an entity as stored, without availability checks.
    pub fn snapshot(&self, id: EntityId) -> Option<Entity<K>> {
        self.entities.lock().ok()?.get(&id).cloned()
    }

    pub fn votes(&self) -> Vec<VoteRecord> {
        self.votes.lock().map(|v| v.clone()).unwrap_or_default()
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, AtomicOrdering::SeqCst);
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.unavailable.load(AtomicOrdering::SeqCst) {
            return Err(StoreError::Backend(anyhow::anyhow!(
                "memory store marked unavailable"
            )));
        }
        Ok(())
    }

    fn not_found(id: EntityId) -> StoreError {
        StoreError::NotFound {
            kind: K::ENTITY_KIND,
            id,
        }
    }
}

fn compare_last_viewed(a: Option<DateTime<Utc>>, b: Option<DateTime<Utc>>) -> Ordering {
    // Never-viewed entities come first.
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(a), Some(b)) => a.cmp(&b),
    }
}

/// Ordering where the preferred candidate sorts first.
fn compare_for<K: ReasonKind>(sort: SortOrder, a: &Entity<K>, b: &Entity<K>) -> Ordering {
    let primary = match sort {
        SortOrder::Random => Ordering::Equal,
        SortOrder::Confidence => b.confidence.total_cmp(&a.confidence),
        SortOrder::LastUpdated => a.last_updated.cmp(&b.last_updated),
        SortOrder::RecentlyUpdated => b.last_updated.cmp(&a.last_updated),
        SortOrder::Reputation => a
            .reputation
            .score()
            .cmp(&b.reputation.score())
            .then(b.reputation.downvotes.cmp(&a.reputation.downvotes)),
        SortOrder::LastViewed => compare_last_viewed(a.last_viewed, b.last_viewed),
    };
    primary.then(a.id.cmp(&b.id))
}

#[async_trait]
impl<K: ReasonKind> EntityStore<K> for MemoryStore<K> {
    async fn fetch_next(
        &self,
        sort: SortOrder,
        status: EntityStatus,
        exclude: &[EntityId],
    ) -> Result<Entity<K>, StoreError> {
        self.check_available()?;
        let entities = lock(&self.entities)?;
        let candidates: Vec<&Entity<K>> = entities
            .values()
            .filter(|e| e.status == status && e.is_reviewable() && !exclude.contains(&e.id))
            .collect();

        let chosen = match sort {
            SortOrder::Random => candidates.choose(&mut rand::thread_rng()).copied(),
            _ => candidates.into_iter().min_by(|a, b| compare_for(sort, a, b)),
        };
        chosen.cloned().ok_or(StoreError::NoTargets)
    }

    async fn get_by_id(&self, id: EntityId) -> Result<Entity<K>, StoreError> {
        self.check_available()?;
        lock(&self.entities)?
            .get(&id)
            .filter(|e| !e.is_deleted)
            .cloned()
            .ok_or_else(|| Self::not_found(id))
    }

    async fn save(&self, entity: &Entity<K>) -> Result<(), StoreError> {
        self.check_available()?;
        let mut entities = lock(&self.entities)?;
        let stored = entities
            .get_mut(&entity.id)
            .ok_or_else(|| Self::not_found(entity.id))?;
        stored.reasons = entity.reasons.clone();
        stored.confidence = entity.confidence;
        stored.status = entity.status;
        stored.last_updated = entity.last_updated;
        stored.last_viewed = entity.last_viewed;
        stored.verified_at = entity.verified_at;
        stored.cleared_at = entity.cleared_at;
        Ok(())
    }

    async fn count_votes(&self, id: EntityId) -> Result<Reputation, StoreError> {
        self.check_available()?;
        lock(&self.entities)?
            .get(&id)
            .map(|e| e.reputation)
            .ok_or_else(|| Self::not_found(id))
    }
}

fn adjust(reputation: &mut Reputation, direction: VoteDirection, delta: i32) {
    let slot = match direction {
        VoteDirection::Up => &mut reputation.upvotes,
        VoteDirection::Down => &mut reputation.downvotes,
    };
    *slot = slot.saturating_add_signed(delta);
}

#[async_trait]
impl<K: ReasonKind> VoteStore for MemoryStore<K> {
    async fn record_vote(&self, vote: VoteRecord) -> Result<(), StoreError> {
        self.check_available()?;
        // Hold both guards before changing either.
        let mut votes = lock(&self.votes)?;
        let mut entities = lock(&self.entities)?;

        let previous = votes
            .iter()
            .position(|v| {
                v.reviewer_id == vote.reviewer_id
                    && v.entity_id == vote.entity_id
                    && v.entity_kind == vote.entity_kind
                    && v.is_training == vote.is_training
            })
            .map(|idx| votes.remove(idx));

        if vote.entity_kind == K::ENTITY_KIND
            && let Some(entity) = entities.get_mut(&vote.entity_id)
        {
            if let Some(prev) = &previous {
                adjust(&mut entity.reputation, prev.direction, -1);
            }
            adjust(&mut entity.reputation, vote.direction, 1);
        }

        votes.push(vote);
        Ok(())
    }

    async fn historical_accuracy(&self, reviewer_id: ReviewerId) -> Result<VoteAccuracy, StoreError> {
        self.check_available()?;
        let votes = lock(&self.votes)?;
        let mut accuracy = VoteAccuracy::default();
        for correct in votes
            .iter()
            .filter(|v| v.reviewer_id == reviewer_id && v.is_training)
            .filter_map(|v| v.is_correct)
        {
            accuracy.total += 1;
            if correct {
                accuracy.correct += 1;
            }
        }
        Ok(accuracy)
    }

    async fn resolve_votes(
        &self,
        kind: EntityKind,
        entity_id: EntityId,
        confirmed: bool,
    ) -> Result<usize, StoreError> {
        self.check_available()?;
        let mut votes = lock(&self.votes)?;
        let mut resolved = 0;
        for vote in votes
            .iter_mut()
            .filter(|v| v.entity_kind == kind && v.entity_id == entity_id && v.is_correct.is_none())
        {
            vote.is_correct = Some(vote.direction.matches_outcome(confirmed));
            resolved += 1;
        }
        Ok(resolved)
    }
}

/// Activity log held in memory.
#[derive(Default)]
pub struct MemoryActivityLog {
    entries: Mutex<Vec<ActivityLogEntry>>,
    failing: AtomicBool,
    delay: Option<Duration>,
}

impl MemoryActivityLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every append, simulating a slow backend.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Make every append fail until reset.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, AtomicOrdering::SeqCst);
    }

    pub fn entries(&self) -> Vec<ActivityLogEntry> {
        self.entries.lock().map(|e| e.clone()).unwrap_or_default()
    }

    /// Insert an entry synchronously, bypassing delay and failure simulation.
    pub fn seed(&self, entry: ActivityLogEntry) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.push(entry);
        }
    }
}

#[async_trait]
impl ActivityLog for MemoryActivityLog {
    async fn append(&self, entry: ActivityLogEntry) -> Result<(), StoreError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing.load(AtomicOrdering::SeqCst) {
            return Err(StoreError::Backend(anyhow::anyhow!("activity log rejected write")));
        }
        lock(&self.entries)?.push(entry);
        Ok(())
    }

    async fn query(&self, filter: &ActivityFilter) -> Result<Vec<ActivityLogEntry>, StoreError> {
        let entries = lock(&self.entries)?;
        Ok(filter.apply(entries.iter()))
    }
}

/// Fixed role assignments.
#[derive(Debug, Clone, Default)]
pub struct MemoryPermissions {
    reviewers: HashSet<ReviewerId>,
    admins: HashSet<ReviewerId>,
}

impl MemoryPermissions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_reviewer(mut self, id: ReviewerId) -> Self {
        self.reviewers.insert(id);
        self
    }

    pub fn with_admin(mut self, id: ReviewerId) -> Self {
        self.admins.insert(id);
        self
    }
}

impl PermissionOracle for MemoryPermissions {
    fn is_reviewer(&self, reviewer_id: ReviewerId) -> bool {
        self.reviewers.contains(&reviewer_id) || self.admins.contains(&reviewer_id)
    }

    fn is_admin(&self, reviewer_id: ReviewerId) -> bool {
        self.admins.contains(&reviewer_id)
    }
}
