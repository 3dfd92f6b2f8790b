//! Response and entity annotations.
//!
//! Annotations are typed side-channel metadata attached to pages, resources and
//! grants: rate-limit state, freshness stamps, expansion hints.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::profile::Profile;

/// Rate-limit state reported by the upstream API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitDescription {
    /// Request budget for the current window.
    pub limit: i64,
    /// Requests remaining in the current window.
    pub remaining: i64,
    /// When the window resets.
    pub reset_at: DateTime<Utc>,
}

/// Typed annotation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Annotation {
    /// Upstream rate-limit state observed on the response.
    RateLimit(RateLimitDescription),
    /// Freshness stamp: a complete snapshot was observed at `value`.
    ETag { value: String },
    /// Opaque metadata the caller can compare between syncs.
    ETagMetadata { metadata: Profile },
    /// The grant may be further resolved into the principals holding
    /// `entitlement_ids`.
    GrantExpandable {
        entitlement_ids: Vec<String>,
        shallow: bool,
    },
    /// Identifier as returned by the upstream API.
    RawId { id: String },
    /// Link to the upstream console.
    ExternalLink { url: String },
    /// The resource type has no entitlements or grants to sync.
    SkipEntitlementsAndGrants,
}

impl Annotation {
    fn same_kind(&self, other: &Annotation) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }
}

/// Ordered collection of annotations, at most one per kind.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Annotations(Vec<Annotation>);

impl Annotations {
    /// Create an empty collection.
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Insert an annotation, replacing any existing one of the same kind.
    pub fn update(&mut self, annotation: Annotation) {
        match self.0.iter_mut().find(|a| a.same_kind(&annotation)) {
            Some(existing) => *existing = annotation,
            None => self.0.push(annotation),
        }
    }

    /// Builder-style [`Annotations::update`].
    #[must_use]
    pub fn with(mut self, annotation: Annotation) -> Self {
        self.update(annotation);
        self
    }

    /// Attach rate-limit state.
    pub fn with_rate_limiting(&mut self, description: RateLimitDescription) {
        self.update(Annotation::RateLimit(description));
    }

    /// Merge another collection into this one; entries from `other` win.
    pub fn merge(&mut self, other: Annotations) {
        for annotation in other.0 {
            self.update(annotation);
        }
    }

    /// Rate-limit state, if present.
    pub fn rate_limit(&self) -> Option<&RateLimitDescription> {
        self.0.iter().find_map(|a| match a {
            Annotation::RateLimit(d) => Some(d),
            _ => None,
        })
    }

    /// Freshness stamp, if present.
    pub fn etag(&self) -> Option<&str> {
        self.0.iter().find_map(|a| match a {
            Annotation::ETag { value } => Some(value.as_str()),
            _ => None,
        })
    }

    /// Expansion hint, if present.
    pub fn grant_expandable(&self) -> Option<(&[String], bool)> {
        self.0.iter().find_map(|a| match a {
            Annotation::GrantExpandable {
                entitlement_ids,
                shallow,
            } => Some((entitlement_ids.as_slice(), *shallow)),
            _ => None,
        })
    }

    /// Check whether any annotation matches the predicate.
    pub fn contains(&self, predicate: impl Fn(&Annotation) -> bool) -> bool {
        self.0.iter().any(predicate)
    }

    /// Iterate over annotations.
    pub fn iter(&self) -> impl Iterator<Item = &Annotation> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<Annotation>> for Annotations {
    fn from(annotations: Vec<Annotation>) -> Self {
        let mut rv = Self::new();
        for a in annotations {
            rv.update(a);
        }
        rv
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_replaces_same_kind() {
        let mut annos = Annotations::new();
        annos.update(Annotation::ETag {
            value: "first".to_string(),
        });
        annos.update(Annotation::RawId {
            id: "00g1".to_string(),
        });
        annos.update(Annotation::ETag {
            value: "second".to_string(),
        });

        assert_eq!(annos.len(), 2);
        assert_eq!(annos.etag(), Some("second"));
    }

    #[test]
    fn test_merge_prefers_incoming() {
        let reset_at = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let mut page = Annotations::new().with(Annotation::RateLimit(RateLimitDescription {
            limit: 600,
            remaining: 10,
            reset_at,
        }));
        let later = Annotations::new().with(Annotation::RateLimit(RateLimitDescription {
            limit: 600,
            remaining: 9,
            reset_at,
        }));

        page.merge(later);
        assert_eq!(page.rate_limit().unwrap().remaining, 9);
    }

    #[test]
    fn test_grant_expandable_lookup() {
        let annos = Annotations::new().with(Annotation::GrantExpandable {
            entitlement_ids: vec!["group:00g1:member".to_string()],
            shallow: true,
        });

        let (ids, shallow) = annos.grant_expandable().unwrap();
        assert_eq!(ids, ["group:00g1:member".to_string()]);
        assert!(shallow);
        assert!(Annotations::new().grant_expandable().is_none());
    }
}
