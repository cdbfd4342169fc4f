//! Bounded, navigable log of recently presented entities.
//!
//! The cursor is `None` when the history is empty and otherwise always points
//! at an existing slot. Pushing always moves the cursor to the newest entry.

use serde::{Deserialize, Serialize};
use warden_common::{Entity, EntityId, ReasonKind};

use crate::errors::StoreError;
use crate::store::EntityStore;

/// Default number of entries kept per session.
pub const DEFAULT_MAX_HISTORY_SIZE: usize = 50;

/// Direction of a history navigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Back,
    Forward,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewHistory {
    entries: Vec<EntityId>,
    cursor: Option<usize>,
    max_size: usize,
}

impl Default for ReviewHistory {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_HISTORY_SIZE)
    }
}

impl ReviewHistory {
    pub fn new(max_size: usize) -> Self {
        Self {
            entries: Vec::new(),
            cursor: None,
            max_size: max_size.max(1),
        }
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn ids(&self) -> &[EntityId] {
        &self.entries
    }

    pub fn cursor(&self) -> Option<usize> {
        self.cursor
    }

    /// Cursor as a signed index, `-1` when empty.
    pub fn index(&self) -> i64 {
        self.cursor.map_or(-1, |c| c as i64)
    }

    pub fn current(&self) -> Option<EntityId> {
        self.cursor.map(|c| self.entries[c])
    }

    /// Whether the cursor sits on the newest entry (or the history is empty).
    pub fn is_at_end(&self) -> bool {
        self.cursor.is_none_or(|c| c + 1 >= self.entries.len())
    }

    /// Record a newly presented entity and move the cursor onto it.
    ///
    /// An id already in the history is moved to the newest slot rather than
    /// duplicated. The oldest entries are evicted past `max_size`.
    pub fn push(&mut self, id: EntityId) {
        if let Some(pos) = self.entries.iter().position(|e| *e == id) {
            self.entries.remove(pos);
        }
        self.entries.push(id);
        if self.entries.len() > self.max_size {
            let excess = self.entries.len() - self.max_size;
            self.entries.drain(..excess);
        }
        self.cursor = Some(self.entries.len() - 1);
    }

    /// Remove an id. Returns whether it was present.
    ///
    /// Removing the entry under the cursor leaves the cursor on the entry that
    /// followed it, or on the new last entry.
    pub fn remove(&mut self, id: EntityId) -> bool {
        match self.entries.iter().position(|e| *e == id) {
            Some(pos) => {
                self.remove_at(pos);
                true
            }
            None => false,
        }
    }

    fn remove_at(&mut self, pos: usize) {
        self.entries.remove(pos);
        self.cursor = match self.cursor {
            _ if self.entries.is_empty() => None,
            Some(c) if pos < c => Some(c - 1),
            Some(c) if pos == c => Some(c.min(self.entries.len() - 1)),
            other => other,
        };
    }

    /// Move the cursor one entry toward older history.
    pub fn step_back(&mut self) -> Option<EntityId> {
        match self.cursor {
            Some(c) if c > 0 => {
                self.cursor = Some(c - 1);
                Some(self.entries[c - 1])
            }
            _ => None,
        }
    }

    /// Move the cursor one entry toward newer history.
    pub fn step_forward(&mut self) -> Option<EntityId> {
        match self.cursor {
            Some(c) if c + 1 < self.entries.len() => {
                self.cursor = Some(c + 1);
                Some(self.entries[c + 1])
            }
            _ => None,
        }
    }

    /// Move one step and load the entity there.
    ///
    /// Ids that no longer resolve are dropped and the same step is retried.
    /// `Ok(None)` means there is nothing further in that direction. On any
    /// other store error the cursor returns to where it started.
    pub async fn navigate<K, S>(
        &mut self,
        direction: Direction,
        store: &S,
    ) -> Result<Option<Entity<K>>, StoreError>
    where
        K: ReasonKind,
        S: EntityStore<K> + ?Sized,
    {
        loop {
            let id = match direction {
                Direction::Back => self.step_back(),
                Direction::Forward => self.step_forward(),
            };
            let Some(id) = id else {
                return Ok(None);
            };

            match store.get_by_id(id).await {
                Ok(entity) => return Ok(Some(entity)),
                Err(StoreError::NotFound { .. }) => {
                    tracing::debug!(entity_id = id, "Dropping unresolvable history entry");
                    let pos = self.cursor.unwrap_or_default();
                    self.remove_at(pos);
                    if direction == Direction::Forward {
                        self.cursor = Some(pos - 1);
                    }
                }
                Err(e) => {
                    self.cursor = self.cursor.map(|c| match direction {
                        Direction::Back => c + 1,
                        Direction::Forward => c - 1,
                    });
                    return Err(e);
                }
            }
        }
    }
}
