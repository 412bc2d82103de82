//! Resource type registry
//!
//! Binds each supported resource type to the handler that knows how to list
//! and delete it, and orders configured types so that dependents are deleted
//! before the resources they depend on.

use crate::error::{Error, Result};
use crate::resource::{AttributeLoader, Resource};
use crate::types::{ResourceType, Session};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Capability set of one supported cloud resource kind.
///
/// Handlers are constructed once, initialized with the provider session on
/// registration, and then only used through `&self`.
pub trait ResourceHandler: AttributeLoader {
    /// Type tag this handler serves
    fn resource_type(&self) -> ResourceType;

    /// Dependency priority.
    ///
    /// Higher values are deleted earlier: a type that depends on another
    /// (a subnet inside a VPC) must have a higher priority than it.
    fn priority(&self) -> i64;

    /// Prepare provider clients for the given session
    fn initialize(&mut self, _session: &Session) -> anyhow::Result<()> {
        Ok(())
    }

    /// List every resource of this type
    fn list(&self) -> anyhow::Result<Vec<Resource>>;

    /// Delete one resource
    fn delete(&self, resource: &Resource) -> anyhow::Result<()>;

    /// Whether this kind lacks a native creation date and relies on the
    /// first-seen marker tag instead
    fn uses_first_seen_marker(&self) -> bool {
        false
    }

    /// Write the first-seen marker tag on a resource
    fn mark_first_seen(&self, _resource: &Resource, _now: DateTime<Utc>) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Type tag and priority of a registered handler
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceTypeDescriptor {
    pub resource_type: ResourceType,
    pub priority: i64,
    pub uses_first_seen_marker: bool,
}

/// Explicit registry of resource handlers
pub struct Registry {
    session: Session,
    handlers: BTreeMap<ResourceType, Arc<dyn ResourceHandler>>,
}

impl Registry {
    /// Create an empty registry whose handlers will share `session`
    pub fn new(session: Session) -> Self {
        Self {
            session,
            handlers: BTreeMap::new(),
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Initialize a handler and bind it under its type tag.
    ///
    /// Type tags and priorities must both be unique.
    pub fn register(&mut self, mut handler: Box<dyn ResourceHandler>) -> Result<()> {
        let resource_type = handler.resource_type();
        log::debug!("Registering resource type {resource_type}");

        if self.handlers.contains_key(&resource_type) {
            return Err(Error::DuplicateResourceType(resource_type));
        }
        let priority = handler.priority();
        if let Some(existing) = self
            .handlers
            .values()
            .find(|h| h.priority() == priority)
        {
            return Err(Error::DuplicatePriority {
                priority,
                existing: existing.resource_type(),
                new: resource_type,
            });
        }

        handler
            .initialize(&self.session)
            .map_err(|e| Error::Initialize {
                resource_type: resource_type.clone(),
                message: format!("{e:#}"),
            })?;

        self.handlers.insert(resource_type, Arc::from(handler));
        Ok(())
    }

    pub fn is_registered(&self, resource_type: &ResourceType) -> bool {
        self.handlers.contains_key(resource_type)
    }

    /// Handler bound to a type
    pub fn handler(&self, resource_type: &ResourceType) -> Result<&Arc<dyn ResourceHandler>> {
        self.handlers
            .get(resource_type)
            .ok_or_else(|| Error::UnsupportedResourceType(resource_type.clone()))
    }

    /// List all resources of a type through its handler
    pub fn list(&self, resource_type: &ResourceType) -> Result<Vec<Resource>> {
        let handler = self.handler(resource_type)?;
        handler
            .list()
            .map_err(|e| Error::list(resource_type, &e))
    }

    /// Priority of a registered type
    pub fn priority(&self, resource_type: &ResourceType) -> Option<i64> {
        self.handlers.get(resource_type).map(|h| h.priority())
    }

    /// Sort configured types into deletion order (descending priority).
    ///
    /// Types without a handler sort last; validation rejects them before a
    /// run starts.
    pub fn ordered_types<'a, I>(&self, configured: I) -> Vec<ResourceType>
    where
        I: IntoIterator<Item = &'a ResourceType>,
    {
        let mut types: Vec<ResourceType> = configured.into_iter().cloned().collect();
        types.sort_by(|a, b| {
            let pa = self.priority(a).unwrap_or(i64::MIN);
            let pb = self.priority(b).unwrap_or(i64::MIN);
            pb.cmp(&pa).then_with(|| a.cmp(b))
        });
        types.dedup();
        types
    }

    /// Every registered type in deletion order
    pub fn descriptors(&self) -> Vec<ResourceTypeDescriptor> {
        self.ordered_types(self.handlers.keys())
            .into_iter()
            .filter_map(|t| {
                self.handlers.get(&t).map(|h| ResourceTypeDescriptor {
                    priority: h.priority(),
                    uses_first_seen_marker: h.uses_first_seen_marker(),
                    resource_type: t,
                })
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}
