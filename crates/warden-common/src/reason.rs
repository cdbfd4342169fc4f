//! Typed reasons attached to an entity under review.
//!
//! Users and groups accept different reason keys, so each entity kind has its
//! own closed enum implementing [`ReasonKind`]. A [`Reasons`] map is keyed by
//! one of those enums, which keeps "every reason type" loops exhaustive.

use crate::entity::EntityKind;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::hash::Hash;

/// A closed set of reason keys valid for one entity kind.
pub trait ReasonKind:
    Copy
    + Ord
    + Eq
    + Hash
    + fmt::Debug
    + fmt::Display
    + Serialize
    + DeserializeOwned
    + Send
    + Sync
    + 'static
{
    /// Entity kind these reasons belong to.
    const ENTITY_KIND: EntityKind;

    /// Every reason type, in display order.
    const ALL: &'static [Self];

    /// Short human-readable label.
    fn label(&self) -> &'static str;
}

/// Reason keys permitted on a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserReasonType {
    Profile,
    Friend,
    Outfit,
    Group,
    Condo,
    Chat,
    Favorites,
    Badges,
}

impl ReasonKind for UserReasonType {
    const ENTITY_KIND: EntityKind = EntityKind::User;

    const ALL: &'static [Self] = &[
        Self::Profile,
        Self::Friend,
        Self::Outfit,
        Self::Group,
        Self::Condo,
        Self::Chat,
        Self::Favorites,
        Self::Badges,
    ];

    fn label(&self) -> &'static str {
        match self {
            Self::Profile => "profile",
            Self::Friend => "friend",
            Self::Outfit => "outfit",
            Self::Group => "group",
            Self::Condo => "condo",
            Self::Chat => "chat",
            Self::Favorites => "favorites",
            Self::Badges => "badges",
        }
    }
}

impl fmt::Display for UserReasonType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Reason keys permitted on a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupReasonType {
    Member,
    Purpose,
    Description,
}

impl ReasonKind for GroupReasonType {
    const ENTITY_KIND: EntityKind = EntityKind::Group;

    const ALL: &'static [Self] = &[Self::Member, Self::Purpose, Self::Description];

    fn label(&self) -> &'static str {
        match self {
            Self::Member => "member",
            Self::Purpose => "purpose",
            Self::Description => "description",
        }
    }
}

impl fmt::Display for GroupReasonType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// A single justification contributing to an entity's confidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reason {
    pub message: String,
    /// Confidence in this reason alone, in `[0, 1]`.
    pub confidence: f64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub evidence: Vec<String>,
}

impl Reason {
    pub fn new(message: impl Into<String>, confidence: f64) -> Self {
        Self {
            message: message.into(),
            confidence,
            evidence: Vec::new(),
        }
    }

    pub fn with_evidence(mut self, evidence: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.evidence = evidence.into_iter().map(Into::into).collect();
        self
    }
}

/// Map from reason type to reason. Ordered so serialization is stable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent, bound(deserialize = ""))]
pub struct Reasons<K: ReasonKind>(BTreeMap<K, Reason>);

impl<K: ReasonKind> Default for Reasons<K> {
    fn default() -> Self {
        Self(BTreeMap::new())
    }
}

impl<K: ReasonKind> Reasons<K> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, kind: K) -> Option<&Reason> {
        self.0.get(&kind)
    }

    pub fn contains(&self, kind: K) -> bool {
        self.0.contains_key(&kind)
    }

    /// Insert or replace a reason, returning the previous value.
    pub fn insert(&mut self, kind: K, reason: Reason) -> Option<Reason> {
        self.0.insert(kind, reason)
    }

    pub fn remove(&mut self, kind: K) -> Option<Reason> {
        self.0.remove(&kind)
    }

    pub fn iter(&self) -> impl Iterator<Item = (K, &Reason)> {
        self.0.iter().map(|(k, r)| (*k, r))
    }

    pub fn confidences(&self) -> impl Iterator<Item = f64> + '_ {
        self.0.values().map(|r| r.confidence)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Reason types that could still be added to this map.
    pub fn missing(&self) -> Vec<K> {
        K::ALL
            .iter()
            .copied()
            .filter(|k| !self.0.contains_key(k))
            .collect()
    }
}

impl<K: ReasonKind> FromIterator<(K, Reason)> for Reasons<K> {
    fn from_iter<I: IntoIterator<Item = (K, Reason)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_lists_unused_types_in_order() {
        let mut reasons = Reasons::<GroupReasonType>::new();
        reasons.insert(GroupReasonType::Purpose, Reason::new("raid group", 0.7));
        assert_eq!(
            reasons.missing(),
            vec![GroupReasonType::Member, GroupReasonType::Description]
        );
    }

    #[test]
    fn test_reasons_serialize_with_snake_case_keys() {
        let reasons: Reasons<UserReasonType> = [(
            UserReasonType::Favorites,
            Reason::new("suspicious favorites", 0.5).with_evidence(["game 1"]),
        )]
        .into_iter()
        .collect();

        let json = serde_json::to_value(&reasons).unwrap();
        assert_eq!(json["favorites"]["confidence"], 0.5);
        assert_eq!(json["favorites"]["evidence"][0], "game 1");

        let back: Reasons<UserReasonType> = serde_json::from_value(json).unwrap();
        assert_eq!(back, reasons);
    }

    #[test]
    fn test_all_covers_every_label() {
        let labels: Vec<_> = UserReasonType::ALL.iter().map(|k| k.label()).collect();
        assert_eq!(labels.len(), 8);
        assert!(labels.contains(&"condo"));
        assert_eq!(GroupReasonType::ENTITY_KIND, EntityKind::Group);
    }
}
