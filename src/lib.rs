//! Warden: a moderation review engine.
//!
//! Reviewers are handed a stream of flagged users and groups. Each decision
//! either records a non-binding training vote or, for reviewers with the role,
//! changes the entity's status, subject to community consensus, a fatigue
//! throttle, and a vote-accuracy ban.
//!
//! | Module        | Purpose                                              |
//! |---------------|------------------------------------------------------|
//! | [`session`]   | `SessionController` and per-reviewer session state   |
//! | [`scheduler`] | Target selection and sort orders                     |
//! | [`review`]    | Navigation history and reason editing                |
//! | [`gates`]     | Consensus, fatigue, and accuracy checks              |
//! | [`store`]     | Persistence traits and in-memory adapters            |
//! | [`audit`]     | Asynchronous activity dispatch and the JSONL log     |
//! | [`config`]    | `warden.toml` loading and layering                   |

pub mod audit;
pub mod config;
pub mod errors;
pub mod gates;
pub mod review;
pub mod scheduler;
pub mod session;
pub mod store;
pub mod telemetry;
pub mod util;

pub use errors::{ReviewError, StoreError};
pub use warden_common::{
    ActivityFilter, ActivityLogEntry, ActivityType, Entity, EntityId, EntityKind, EntityStatus,
    Group, GroupReasonType, Reason, ReasonKind, Reasons, Reputation, ReviewerId, User,
    UserReasonType, VoteAccuracy, VoteDirection, VoteRecord,
};
