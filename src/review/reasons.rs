//! Reviewer edits to an entity's reasons.
//!
//! Every mutation recomputes `Entity::confidence` from the reason map, so the
//! two never drift apart. The first edit on a target snapshots the reasons and
//! confidence as presented; [`ReasonAggregator::restore`] puts that snapshot
//! back exactly.
//!
//! ## Aggregation
//!
//! Overall confidence is the noisy-or of the individual confidences,
//! `1 - Π(1 - cᵢ)`, rounded up to two decimals. It never falls below the
//! strongest single reason and never exceeds 1. No reasons means 0.

use serde::{Deserialize, Serialize};
use warden_common::{Entity, Reason, ReasonKind, Reasons};

use crate::errors::ReviewError;
use crate::util::ceil2;

/// What an upsert did to the reason map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasonChange {
    Added,
    Updated,
    Removed,
    Unchanged,
}

#[derive(Debug, Clone)]
pub struct ReasonAggregator<K: ReasonKind> {
    original: Option<(Reasons<K>, f64)>,
}

impl<K: ReasonKind> Default for ReasonAggregator<K> {
    fn default() -> Self {
        Self { original: None }
    }
}

impl<K: ReasonKind> ReasonAggregator<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overall confidence for a reason map.
    pub fn aggregate(reasons: &Reasons<K>) -> f64 {
        let (miss, strongest) = reasons
            .confidences()
            .map(|c| c.clamp(0.0, 1.0))
            .fold((1.0, 0.0_f64), |(miss, strongest), c| {
                (miss * (1.0 - c), strongest.max(c))
            });
        ceil2(1.0 - miss).max(strongest).clamp(0.0, 1.0)
    }

    /// Whether any edit has been made since the target was presented.
    pub fn is_modified(&self) -> bool {
        self.original.is_some()
    }

    fn capture(&mut self, entity: &Entity<K>) {
        if self.original.is_none() {
            self.original = Some((entity.reasons.clone(), entity.confidence));
        }
    }

    /// Add or replace a reason. An empty message removes the reason instead.
    pub fn upsert(
        &mut self,
        entity: &mut Entity<K>,
        kind: K,
        message: &str,
        confidence: f64,
        evidence: Vec<String>,
    ) -> Result<ReasonChange, ReviewError> {
        let message = message.trim();
        if message.is_empty() {
            return Ok(if self.remove(entity, kind) {
                ReasonChange::Removed
            } else {
                ReasonChange::Unchanged
            });
        }

        if !confidence.is_finite() || !(0.0..=1.0).contains(&confidence) {
            return Err(ReviewError::validation(
                "confidence",
                format!("{} is not between 0 and 1", confidence),
            ));
        }

        let evidence: Vec<String> = evidence.into_iter().map(|e| e.trim().to_string()).collect();
        if evidence.iter().any(String::is_empty) {
            return Err(ReviewError::validation(
                "evidence",
                "evidence entries must not be blank",
            ));
        }

        let reason = Reason {
            message: message.to_string(),
            confidence,
            evidence,
        };
        if entity.reasons.get(kind) == Some(&reason) {
            return Ok(ReasonChange::Unchanged);
        }

        self.capture(entity);
        let change = match entity.reasons.insert(kind, reason) {
            Some(_) => ReasonChange::Updated,
            None => ReasonChange::Added,
        };
        entity.confidence = Self::aggregate(&entity.reasons);
        Ok(change)
    }

    /// Remove a reason. Returns whether it was present.
    pub fn remove(&mut self, entity: &mut Entity<K>, kind: K) -> bool {
        if !entity.reasons.contains(kind) {
            return false;
        }
        self.capture(entity);
        entity.reasons.remove(kind);
        entity.confidence = Self::aggregate(&entity.reasons);
        true
    }

    /// Roll back every edit since the target was presented.
    /// Returns false when there was nothing to restore.
    pub fn restore(&mut self, entity: &mut Entity<K>) -> bool {
        match self.original.take() {
            Some((reasons, confidence)) => {
                entity.reasons = reasons;
                entity.confidence = confidence;
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use warden_common::{GroupReasonType, User, UserReasonType};

    fn user_with(reasons: &[(UserReasonType, f64)]) -> User {
        let mut user = User::new(1, "alice");
        for (kind, confidence) in reasons {
            user.reasons
                .insert(*kind, Reason::new(format!("{kind} reason"), *confidence));
        }
        user.confidence = ReasonAggregator::aggregate(&user.reasons);
        user
    }

    #[test]
    fn test_aggregate_empty_is_zero() {
        assert_eq!(ReasonAggregator::aggregate(&Reasons::<GroupReasonType>::new()), 0.0);
    }

    #[test]
    fn test_aggregate_is_noisy_or() {
        let user = user_with(&[(UserReasonType::Profile, 0.5), (UserReasonType::Chat, 0.5)]);
        assert_eq!(user.confidence, 0.75);
    }

    #[test]
    fn test_aggregate_bounded_and_monotonic() {
        let steps = [0.1, 0.35, 0.9, 0.0, 1.0, 0.42, 0.77, 0.05];
        let mut user = User::new(1, "alice");
        let mut agg = ReasonAggregator::new();
        let mut previous = 0.0;
        for (kind, confidence) in UserReasonType::ALL.iter().zip(steps) {
            let before_min = user.reasons.confidences().fold(1.0_f64, f64::min);
            agg.upsert(&mut user, *kind, "reason", confidence, Vec::new())
                .unwrap();
            assert!((0.0..=1.0).contains(&user.confidence));
            assert!(user.confidence >= previous);
            if user.reasons.len() > 1 {
                assert!(user.confidence >= before_min);
            }
            assert!(user.confidence >= confidence);
            previous = user.confidence;
        }
    }

    #[test]
    fn test_aggregate_never_rounds_below_a_reason() {
        let single = user_with(&[(UserReasonType::Profile, 0.454)]);
        assert_eq!(single.confidence, 0.46);

        let tiny = user_with(&[(UserReasonType::Profile, 0.001)]);
        assert_eq!(tiny.confidence, 0.01);

        let steps = [0.001, 0.002, 0.333, 0.0049, 0.9999, 0.123_456];
        let mut user = User::new(1, "alice");
        let mut agg = ReasonAggregator::new();
        let mut previous = 0.0;
        for (kind, confidence) in UserReasonType::ALL.iter().zip(steps) {
            agg.upsert(&mut user, *kind, "reason", confidence, Vec::new())
                .unwrap();
            let strongest = user.reasons.confidences().fold(0.0_f64, f64::max);
            assert!(user.confidence >= strongest, "{} < {}", user.confidence, strongest);
            assert!(user.confidence >= previous);
            assert!(user.confidence <= 1.0);
            previous = user.confidence;
        }
    }

    #[test]
    fn test_confidence_tracks_every_mutation() {
        let mut user = user_with(&[(UserReasonType::Outfit, 0.6)]);
        let mut agg = ReasonAggregator::new();

        agg.upsert(&mut user, UserReasonType::Friend, "friends are flagged", 0.5, vec![])
            .unwrap();
        assert_eq!(user.confidence, ReasonAggregator::aggregate(&user.reasons));

        agg.upsert(&mut user, UserReasonType::Outfit, "outfit", 0.2, vec![])
            .unwrap();
        assert_eq!(user.confidence, ReasonAggregator::aggregate(&user.reasons));

        assert!(agg.remove(&mut user, UserReasonType::Friend));
        assert_eq!(user.confidence, 0.2);
    }

    #[test]
    fn test_removing_only_reason_zeroes_confidence() {
        let mut user = user_with(&[(UserReasonType::Condo, 0.9)]);
        let mut agg = ReasonAggregator::new();
        assert!(agg.remove(&mut user, UserReasonType::Condo));
        assert!(user.reasons.is_empty());
        assert_eq!(user.confidence, 0.0);
    }

    #[test]
    fn test_empty_message_removes_reason() {
        let mut user = user_with(&[(UserReasonType::Chat, 0.4)]);
        let mut agg = ReasonAggregator::new();
        let change = agg
            .upsert(&mut user, UserReasonType::Chat, "   ", 0.4, vec![])
            .unwrap();
        assert_eq!(change, ReasonChange::Removed);
        assert!(!user.reasons.contains(UserReasonType::Chat));

        let change = agg
            .upsert(&mut user, UserReasonType::Badges, "", 0.4, vec![])
            .unwrap();
        assert_eq!(change, ReasonChange::Unchanged);
    }

    #[test]
    fn test_invalid_confidence_is_rejected_before_mutation() {
        let mut user = user_with(&[(UserReasonType::Chat, 0.4)]);
        let before = user.clone();
        let mut agg = ReasonAggregator::new();

        for bad in [1.5, -0.1, f64::NAN, f64::INFINITY] {
            let err = agg
                .upsert(&mut user, UserReasonType::Chat, "spam", bad, vec![])
                .unwrap_err();
            assert!(matches!(err, ReviewError::Validation { field: "confidence", .. }));
        }
        assert_eq!(user, before);
        assert!(!agg.is_modified());
    }

    #[test]
    fn test_blank_evidence_is_rejected() {
        let mut user = User::new(1, "alice");
        let mut agg = ReasonAggregator::new();
        let err = agg
            .upsert(
                &mut user,
                UserReasonType::Chat,
                "spam",
                0.5,
                vec!["msg 1".into(), "  ".into()],
            )
            .unwrap_err();
        assert!(matches!(err, ReviewError::Validation { field: "evidence", .. }));
        assert!(user.reasons.is_empty());
    }

    #[test]
    fn test_restore_is_byte_for_byte() {
        let mut user = user_with(&[(UserReasonType::Profile, 0.7), (UserReasonType::Group, 0.3)]);
        // Classifier confidence need not match the aggregate; restore keeps it verbatim.
        user.confidence = 0.66;
        let original_reasons = serde_json::to_vec(&user.reasons).unwrap();
        let original_confidence = user.confidence;

        let mut agg = ReasonAggregator::new();
        agg.upsert(&mut user, UserReasonType::Profile, "edited", 0.9, vec!["e1".into()])
            .unwrap();
        agg.remove(&mut user, UserReasonType::Group);
        agg.upsert(&mut user, UserReasonType::Chat, "new", 0.1, vec![])
            .unwrap();
        assert!(agg.is_modified());

        assert!(agg.restore(&mut user));
        assert_eq!(serde_json::to_vec(&user.reasons).unwrap(), original_reasons);
        assert_eq!(user.confidence.to_bits(), original_confidence.to_bits());
        assert!(!agg.is_modified());
        assert!(!agg.restore(&mut user));
    }

    #[test]
    fn test_identical_upsert_does_not_mark_modified() {
        let mut user = User::new(1, "alice");
        user.reasons.insert(UserReasonType::Chat, Reason::new("spam", 0.5));
        let mut agg = ReasonAggregator::new();
        let change = agg
            .upsert(&mut user, UserReasonType::Chat, "spam", 0.5, vec![])
            .unwrap();
        assert_eq!(change, ReasonChange::Unchanged);
        assert!(!agg.is_modified());
    }
}
