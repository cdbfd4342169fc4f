//! Shared domain types for the Warden review engine.
//!
//! Everything here is plain data: entities under review, their typed reasons,
//! training votes, and the append-only activity log entries. Behaviour lives in
//! the `warden` crate.

pub mod activity;
pub mod entity;
pub mod reason;
pub mod vote;

pub use activity::{ActivityFilter, ActivityLogEntry, ActivityType};
pub use entity::{Entity, EntityKind, EntityStatus, Group, Reputation, User};
pub use reason::{GroupReasonType, Reason, ReasonKind, Reasons, UserReasonType};
pub use vote::{VoteAccuracy, VoteDirection, VoteRecord};

/// Identifier of a user or group under review.
pub type EntityId = u64;

/// Identifier of the human moderator performing reviews.
pub type ReviewerId = u64;
