use crate::entity::EntityKind;
use crate::{EntityId, ReviewerId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Kind of transition recorded in the activity log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityType {
    Viewed,
    Confirmed,
    Cleared,
    Skipped,
    TrainingUpvote,
    TrainingDownvote,
    ReasonUpdated,
    ReasonsRestored,
    NavigatedBack,
    NavigatedForward,
    ModeSwitched,
    TargetModeChanged,
    BreakStarted,
    ConsensusOverride,
}

impl ActivityType {
    /// Whether this activity counts as looking at the target.
    pub fn is_view(&self) -> bool {
        matches!(
            self,
            Self::Viewed | Self::NavigatedBack | Self::NavigatedForward
        )
    }
}

impl fmt::Display for ActivityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Viewed => "viewed",
            Self::Confirmed => "confirmed",
            Self::Cleared => "cleared",
            Self::Skipped => "skipped",
            Self::TrainingUpvote => "training_upvote",
            Self::TrainingDownvote => "training_downvote",
            Self::ReasonUpdated => "reason_updated",
            Self::ReasonsRestored => "reasons_restored",
            Self::NavigatedBack => "navigated_back",
            Self::NavigatedForward => "navigated_forward",
            Self::ModeSwitched => "mode_switched",
            Self::TargetModeChanged => "target_mode_changed",
            Self::BreakStarted => "break_started",
            Self::ConsensusOverride => "consensus_override",
        };
        write!(f, "{}", s)
    }
}

impl std::str::FromStr for ActivityType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        serde_json::from_value(serde_json::Value::String(s.to_lowercase()))
            .map_err(|_| format!("Unknown activity type '{}'", s))
    }
}

/// Immutable record of one reviewer-visible transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityLogEntry {
    pub id: Uuid,
    pub reviewer_id: ReviewerId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_id: Option<EntityId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_kind: Option<EntityKind>,
    pub activity_type: ActivityType,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub details: serde_json::Value,
}

impl ActivityLogEntry {
    pub fn new(reviewer_id: ReviewerId, activity_type: ActivityType, timestamp: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            reviewer_id,
            target_id: None,
            target_kind: None,
            activity_type,
            timestamp,
            details: serde_json::Value::Null,
        }
    }

    pub fn with_target(mut self, kind: EntityKind, id: EntityId) -> Self {
        self.target_kind = Some(kind);
        self.target_id = Some(id);
        self
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = details;
        self
    }
}

/// Query over the activity log. Unset fields match everything.
#[derive(Debug, Clone, Default)]
pub struct ActivityFilter {
    pub reviewer_id: Option<ReviewerId>,
    pub target_id: Option<EntityId>,
    pub target_kind: Option<EntityKind>,
    pub activity_type: Option<ActivityType>,
    pub since: Option<DateTime<Utc>>,
    /// Keep only the newest N matches.
    pub limit: Option<usize>,
}

impl ActivityFilter {
    pub fn for_target(kind: EntityKind, id: EntityId) -> Self {
        Self {
            target_kind: Some(kind),
            target_id: Some(id),
            ..Default::default()
        }
    }

    pub fn since(mut self, at: DateTime<Utc>) -> Self {
        self.since = Some(at);
        self
    }

    pub fn matches(&self, entry: &ActivityLogEntry) -> bool {
        self.reviewer_id.is_none_or(|r| entry.reviewer_id == r)
            && self.target_id.is_none_or(|t| entry.target_id == Some(t))
            && self.target_kind.is_none_or(|k| entry.target_kind == Some(k))
            && self.activity_type.is_none_or(|a| entry.activity_type == a)
            && self.since.is_none_or(|s| entry.timestamp >= s)
    }

    /// Filter entries (oldest first) and apply the limit to the newest end.
    pub fn apply<'a>(&self, entries: impl IntoIterator<Item = &'a ActivityLogEntry>) -> Vec<ActivityLogEntry> {
        let mut matched: Vec<ActivityLogEntry> = entries
            .into_iter()
            .filter(|e| self.matches(e))
            .cloned()
            .collect();
        if let Some(limit) = self.limit
            && matched.len() > limit
        {
            let excess = matched.len() - limit;
            matched.drain(..excess);
        }
        matched
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn entry(reviewer: ReviewerId, target: EntityId, at: DateTime<Utc>) -> ActivityLogEntry {
        ActivityLogEntry::new(reviewer, ActivityType::Viewed, at).with_target(EntityKind::User, target)
    }

    #[test]
    fn test_activity_type_parses_snake_case() {
        assert_eq!(
            "training_upvote".parse::<ActivityType>(),
            Ok(ActivityType::TrainingUpvote)
        );
        assert!("nope".parse::<ActivityType>().is_err());
        assert_eq!(ActivityType::BreakStarted.to_string(), "break_started");
    }

    #[test]
    fn test_filter_matches_target_and_window() {
        let now = Utc::now();
        let entries = vec![
            entry(1, 10, now - Duration::minutes(10)),
            entry(2, 10, now - Duration::minutes(1)),
            entry(3, 11, now),
        ];
        let filter = ActivityFilter::for_target(EntityKind::User, 10).since(now - Duration::minutes(5));
        let matched = filter.apply(&entries);
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].reviewer_id, 2);
    }

    #[test]
    fn test_filter_limit_keeps_newest() {
        let now = Utc::now();
        let entries: Vec<_> = (0..5).map(|i| entry(i, 1, now + Duration::seconds(i as i64))).collect();
        let filter = ActivityFilter {
            limit: Some(2),
            ..Default::default()
        };
        let matched = filter.apply(&entries);
        assert_eq!(matched.iter().map(|e| e.reviewer_id).collect::<Vec<_>>(), vec![3, 4]);
    }

    #[test]
    fn test_entry_json_skips_null_details() {
        let e = ActivityLogEntry::new(5, ActivityType::ModeSwitched, Utc::now());
        let json = serde_json::to_value(&e).unwrap();
        assert!(json.get("details").is_none());
        assert!(json.get("target_id").is_none());
    }
}
