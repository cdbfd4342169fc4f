//! Typed error hierarchy for the Warden review engine.
//!
//! Two top-level enums cover the two layers:
//! - `StoreError`: failures reported by persistence adapters
//! - `ReviewError`: everything a reviewer action can be refused or fail with

use chrono::{DateTime, Utc};
use thiserror::Error;
use warden_common::{EntityId, EntityKind, ReviewerId};

/// Errors from the persistence adapters (entity, vote, and activity stores).
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{kind} {id} not found")]
    NotFound { kind: EntityKind, id: EntityId },

    #[error("No targets available")]
    NoTargets,

    #[error("Store lock poisoned")]
    LockPoisoned,

    #[error("Storage backend error: {0}")]
    Backend(#[source] anyhow::Error),
}

/// Errors surfaced to the presentation layer by the session controller.
#[derive(Debug, Error)]
pub enum ReviewError {
    #[error("{kind} {id} not found")]
    NotFound { kind: EntityKind, id: EntityId },

    #[error("Nothing to review right now")]
    NoTargets,

    #[error("No target is currently being reviewed")]
    NoActiveTarget,

    #[error("Permission denied: {action} requires the {required} role")]
    PermissionDenied {
        action: &'static str,
        required: &'static str,
    },

    #[error("Blocked by community consensus: {reason}")]
    ConsensusBlocked { reason: String },

    #[error("Reviewer {reviewer_id} is banned for inaccurate training votes")]
    Banned { reviewer_id: ReviewerId },

    #[error("Break required until {until}")]
    BreakRequired { until: DateTime<Utc> },

    #[error("Invalid {field}: {message}")]
    Validation { field: &'static str, message: String },

    #[error("Storage unavailable: {0}")]
    Transient(#[source] StoreError),
}

impl ReviewError {
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            field,
            message: message.into(),
        }
    }

    /// Whether the reviewer must change course rather than retry.
    pub fn is_blocking(&self) -> bool {
        matches!(
            self,
            Self::ConsensusBlocked { .. } | Self::Banned { .. } | Self::BreakRequired { .. }
        )
    }

    /// Message safe to show a reviewer. Storage internals are never exposed.
    pub fn user_message(&self) -> String {
        match self {
            Self::Transient(_) => "Something went wrong, please try again.".to_string(),
            other => other.to_string(),
        }
    }
}

impl From<StoreError> for ReviewError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { kind, id } => ReviewError::NotFound { kind, id },
            StoreError::NoTargets => ReviewError::NoTargets,
            other => ReviewError::Transient(other),
        }
    }
}
