//! Test doubles for handlers

use crate::resource::{AttributeLoader, Attributes, Resource};
use crate::registry::ResourceHandler;
use crate::types::{ResourceType, Tags};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Shared counters a test keeps after handing the handler to a registry
#[derive(Debug, Default)]
pub struct Calls {
    pub list: AtomicUsize,
    pub load: AtomicUsize,
    pub delete: AtomicUsize,
    pub mark: AtomicUsize,
    pub in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
    pub deleted: std::sync::Mutex<Vec<String>>,
}

impl Calls {
    pub fn deletes(&self) -> usize {
        self.delete.load(Ordering::SeqCst)
    }

    pub fn loads(&self) -> usize {
        self.load.load(Ordering::SeqCst)
    }

    pub fn deleted_ids(&self) -> Vec<String> {
        let mut ids = match self.deleted.lock() {
            Ok(ids) => ids.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        };
        ids.sort();
        ids
    }
}

/// Scriptable in-memory handler
pub struct MockHandler {
    resource_type: ResourceType,
    priority: i64,
    resources: Vec<Resource>,
    lazy: BTreeMap<String, Attributes>,
    fail_list: bool,
    fail_delete: HashSet<String>,
    fail_load: HashSet<String>,
    delete_delay: Duration,
    first_seen: bool,
    pub calls: Arc<Calls>,
}

impl MockHandler {
    pub fn new(resource_type: &str, priority: i64) -> Self {
        Self {
            resource_type: ResourceType::from(resource_type),
            priority,
            resources: Vec::new(),
            lazy: BTreeMap::new(),
            fail_list: false,
            fail_delete: HashSet::new(),
            fail_load: HashSet::new(),
            delete_delay: Duration::ZERO,
            first_seen: false,
            calls: Arc::new(Calls::default()),
        }
    }

    pub fn with_resources(mut self, resources: Vec<Resource>) -> Self {
        self.resources = resources;
        self
    }

    /// Attributes served by lazy loading for `id`
    pub fn with_lazy(mut self, id: &str, tags: Tags, created: Option<DateTime<Utc>>) -> Self {
        self.lazy
            .insert(id.to_string(), Attributes { tags, created });
        self
    }

    pub fn failing_list(mut self) -> Self {
        self.fail_list = true;
        self
    }

    pub fn failing_delete(mut self, id: &str) -> Self {
        self.fail_delete.insert(id.to_string());
        self
    }

    pub fn failing_load(mut self, id: &str) -> Self {
        self.fail_load.insert(id.to_string());
        self
    }

    pub fn with_delete_delay(mut self, delay: Duration) -> Self {
        self.delete_delay = delay;
        self
    }

    pub fn with_first_seen_marker(mut self) -> Self {
        self.first_seen = true;
        self
    }

    pub fn calls(&self) -> Arc<Calls> {
        Arc::clone(&self.calls)
    }
}

impl AttributeLoader for MockHandler {
    fn load_attributes(&self, resource: &Resource) -> anyhow::Result<Attributes> {
        self.calls.load.fetch_add(1, Ordering::SeqCst);
        if self.fail_load.contains(&resource.id) {
            anyhow::bail!("describe failed for {}", resource.id);
        }
        Ok(self.lazy.get(&resource.id).cloned().unwrap_or_default())
    }
}

impl ResourceHandler for MockHandler {
    fn resource_type(&self) -> ResourceType {
        self.resource_type.clone()
    }

    fn priority(&self) -> i64 {
        self.priority
    }

    fn list(&self) -> anyhow::Result<Vec<Resource>> {
        self.calls.list.fetch_add(1, Ordering::SeqCst);
        if self.fail_list {
            anyhow::bail!("RequestLimitExceeded");
        }
        Ok(self.resources.clone())
    }

    fn delete(&self, resource: &Resource) -> anyhow::Result<()> {
        self.calls.delete.fetch_add(1, Ordering::SeqCst);
        let now = self.calls.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.calls.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if !self.delete_delay.is_zero() {
            std::thread::sleep(self.delete_delay);
        }

        self.calls.in_flight.fetch_sub(1, Ordering::SeqCst);
        if self.fail_delete.contains(&resource.id) {
            anyhow::bail!("DependencyViolation");
        }
        match self.calls.deleted.lock() {
            Ok(mut ids) => ids.push(resource.id.clone()),
            Err(poisoned) => poisoned.into_inner().push(resource.id.clone()),
        }
        Ok(())
    }

    fn uses_first_seen_marker(&self) -> bool {
        self.first_seen
    }

    fn mark_first_seen(&self, _resource: &Resource, _now: DateTime<Utc>) -> anyhow::Result<()> {
        self.calls.mark.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
