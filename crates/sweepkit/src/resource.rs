//! Canonical resource representation and the lazy-load contract
//!
//! A [`Resource`] is what every provider adapter produces from its listing
//! call. Listing-time attributes (type, id, name) are always filled in. Tags
//! and creation date may cost extra provider calls, so adapters can leave
//! them out and supply them later through an [`AttributeLoader`].

use crate::error::{Error, Result};
use crate::marker;
use crate::types::{ResourceType, Tags};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One cloud object of a specific type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    /// Resource type tag
    #[serde(rename = "type")]
    pub resource_type: ResourceType,
    /// Identifier the provider deletes by
    pub id: String,
    /// Human label, when the provider has one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub tags: Tags,
    /// Creation timestamp, when known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,
    /// Whether expensive attributes have been fetched
    #[serde(skip)]
    pub lazy_loaded: bool,
}

impl Resource {
    pub fn new(resource_type: impl Into<ResourceType>, id: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            id: id.into(),
            name: None,
            tags: Tags::new(),
            created: None,
            lazy_loaded: false,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    pub fn with_tags(mut self, tags: Tags) -> Self {
        self.tags.extend(tags);
        self
    }

    pub fn with_created(mut self, created: DateTime<Utc>) -> Self {
        self.created = Some(created);
        self
    }

    /// Mark the resource as complete; no attribute load will be attempted.
    ///
    /// Adapters whose listing call already returns tags and creation date
    /// use this. The first-seen marker is still honored.
    pub fn loaded(mut self) -> Self {
        self.apply_first_seen();
        self.lazy_loaded = true;
        self
    }

    /// Name if present, otherwise the id
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }

    /// Fetch tags and creation date if not done yet.
    ///
    /// Idempotent: only the first call reaches the loader. A failed load
    /// still counts as loaded, so a broken resource costs one provider call
    /// and one warning per run rather than one per predicate.
    pub fn ensure_loaded(&mut self, loader: &dyn AttributeLoader) -> Result<()> {
        if self.lazy_loaded {
            return Ok(());
        }
        self.lazy_loaded = true;

        log::debug!("Loading attributes of {} '{}'", self.resource_type, self.id);
        let attributes = loader
            .load_attributes(self)
            .map_err(|e| Error::LazyLoad {
                resource_type: self.resource_type.clone(),
                id: self.id.clone(),
                message: format!("{e:#}"),
            });

        let result = attributes.map(|attrs| self.merge(attrs));
        self.apply_first_seen();
        result
    }

    fn merge(&mut self, attributes: Attributes) {
        self.tags.extend(attributes.tags);
        if attributes.created.is_some() {
            self.created = attributes.created;
        }
    }

    fn apply_first_seen(&mut self) {
        if self.created.is_none() {
            self.created = marker::first_seen(&self.tags);
        }
    }
}

/// Attributes fetched by a lazy load
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Attributes {
    pub tags: Tags,
    pub created: Option<DateTime<Utc>>,
}

/// Source of tags and creation date for resources that listed without them
pub trait AttributeLoader: Send + Sync {
    /// Fetch the expensive attributes of `resource`.
    ///
    /// Default implementation returns nothing, for kinds whose listing call
    /// already carries everything.
    fn load_attributes(&self, _resource: &Resource) -> anyhow::Result<Attributes> {
        Ok(Attributes::default())
    }
}

/// Loader that never fetches anything
pub struct NoLoad;

impl AttributeLoader for NoLoad {}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingLoader {
        calls: AtomicUsize,
        fail: bool,
    }

    impl CountingLoader {
        fn new(fail: bool) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail,
            }
        }
    }

    impl AttributeLoader for CountingLoader {
        fn load_attributes(&self, _resource: &Resource) -> anyhow::Result<Attributes> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                anyhow::bail!("AccessDenied");
            }
            let mut tags = Tags::new();
            tags.insert("env".into(), "test".into());
            Ok(Attributes {
                tags,
                created: Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()),
            })
        }
    }

    #[test]
    fn test_ensure_loaded_is_idempotent() {
        let loader = CountingLoader::new(false);
        let mut r = Resource::new("aws_s3_bucket", "logs").with_tag("owner", "ci");

        r.ensure_loaded(&loader).unwrap();
        r.ensure_loaded(&loader).unwrap();

        assert_eq!(loader.calls.load(Ordering::SeqCst), 1);
        assert!(r.lazy_loaded);
        assert_eq!(r.tags.get("env").map(String::as_str), Some("test"));
        assert_eq!(r.tags.get("owner").map(String::as_str), Some("ci"));
        assert!(r.created.is_some());
    }

    #[test]
    fn test_failed_load_reported_once() {
        let loader = CountingLoader::new(true);
        let mut r = Resource::new("aws_s3_bucket", "logs");

        let err = r.ensure_loaded(&loader).unwrap_err();
        assert!(matches!(err, Error::LazyLoad { .. }));
        assert!(!err.is_fatal());

        r.ensure_loaded(&loader).unwrap();
        assert_eq!(loader.calls.load(Ordering::SeqCst), 1);
        assert!(r.created.is_none());
    }

    #[test]
    fn test_loaded_resources_skip_loader() {
        let loader = CountingLoader::new(false);
        let mut r = Resource::new("aws_instance", "i-1").loaded();
        r.ensure_loaded(&loader).unwrap();
        assert_eq!(loader.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_first_seen_marker_fills_creation_date() {
        let mut r = Resource::new("aws_medialive_input", "1234")
            .with_tag(marker::FIRST_SEEN_TAG, "2024-02-01T00:00:00Z");
        r.ensure_loaded(&NoLoad).unwrap();
        assert_eq!(
            r.created,
            Some(Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_native_creation_date_wins_over_marker() {
        let native = Utc.with_ymd_and_hms(2023, 6, 1, 0, 0, 0).unwrap();
        let r = Resource::new("aws_instance", "i-1")
            .with_tag(marker::FIRST_SEEN_TAG, "2024-02-01T00:00:00Z")
            .with_created(native)
            .loaded();
        assert_eq!(r.created, Some(native));
    }
}
