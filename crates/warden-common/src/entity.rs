use crate::EntityId;
use crate::reason::{GroupReasonType, ReasonKind, Reasons, UserReasonType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which kind of entity a record describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    User,
    Group,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKind::User => write!(f, "user"),
            EntityKind::Group => write!(f, "group"),
        }
    }
}

impl std::str::FromStr for EntityKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "user" => Ok(EntityKind::User),
            "group" => Ok(EntityKind::Group),
            _ => Err(format!("Invalid entity kind '{}'. Valid values: user, group", s)),
        }
    }
}

/// Lifecycle status of an entity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityStatus {
    #[default]
    Flagged,
    Confirmed,
    Cleared,
}

impl fmt::Display for EntityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityStatus::Flagged => write!(f, "flagged"),
            EntityStatus::Confirmed => write!(f, "confirmed"),
            EntityStatus::Cleared => write!(f, "cleared"),
        }
    }
}

impl std::str::FromStr for EntityStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "flagged" => Ok(EntityStatus::Flagged),
            "confirmed" => Ok(EntityStatus::Confirmed),
            "cleared" => Ok(EntityStatus::Cleared),
            other => Err(format!(
                "Invalid status '{}'. Valid values: flagged, confirmed, cleared",
                other
            )),
        }
    }
}

/// Community vote tally on an entity.
///
/// An upvote vouches for the entity; a downvote agrees it is inappropriate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reputation {
    pub upvotes: u32,
    pub downvotes: u32,
}

impl Reputation {
    pub fn new(upvotes: u32, downvotes: u32) -> Self {
        Self { upvotes, downvotes }
    }

    pub fn total(&self) -> u32 {
        self.upvotes.saturating_add(self.downvotes)
    }

    /// Net score; lower means worse standing.
    pub fn score(&self) -> i64 {
        i64::from(self.upvotes) - i64::from(self.downvotes)
    }
}

/// A user or group under moderation review.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound(deserialize = ""))]
pub struct Entity<K: ReasonKind> {
    pub id: EntityId,
    pub name: String,
    /// Owning user for groups; unset for users.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<EntityId>,
    #[serde(default)]
    pub status: EntityStatus,
    /// Always equal to the aggregate of `reasons`.
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub reasons: Reasons<K>,
    #[serde(default)]
    pub reputation: Reputation,
    pub last_updated: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_viewed: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verified_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cleared_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_deleted: bool,
    #[serde(default)]
    pub is_locked: bool,
}

/// A user under review.
pub type User = Entity<UserReasonType>;

/// A group under review.
pub type Group = Entity<GroupReasonType>;

impl<K: ReasonKind> Entity<K> {
    pub fn new(id: EntityId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            owner_id: None,
            status: EntityStatus::Flagged,
            confidence: 0.0,
            reasons: Reasons::new(),
            reputation: Reputation::default(),
            last_updated: Utc::now(),
            last_viewed: None,
            verified_at: None,
            cleared_at: None,
            is_deleted: false,
            is_locked: false,
        }
    }

    pub fn kind(&self) -> EntityKind {
        K::ENTITY_KIND
    }

    pub fn with_status(mut self, status: EntityStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_owner(mut self, owner_id: EntityId) -> Self {
        self.owner_id = Some(owner_id);
        self
    }

    pub fn with_reputation(mut self, upvotes: u32, downvotes: u32) -> Self {
        self.reputation = Reputation::new(upvotes, downvotes);
        self
    }

    pub fn with_last_updated(mut self, at: DateTime<Utc>) -> Self {
        self.last_updated = at;
        self
    }

    pub fn with_last_viewed(mut self, at: DateTime<Utc>) -> Self {
        self.last_viewed = Some(at);
        self
    }

    /// Whether the entity may be offered to reviewers at all.
    pub fn is_reviewable(&self) -> bool {
        !self.is_deleted && !self.is_locked
    }
}
