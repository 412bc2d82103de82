//! `ResourceHandler` implementation shared by every AWS kind

use super::kinds::AwsKind;
use super::{AwsCli, Connect};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use sweepkit::{AttributeLoader, Attributes, Resource, ResourceHandler, ResourceType, Session};

/// Handler for one resource kind; connected on registration
pub struct AwsHandler {
    kind: AwsKind,
    connector: Arc<dyn Connect>,
    cli: Option<Arc<dyn AwsCli>>,
    /// ARNs seen while listing, by resource id
    arns: Mutex<BTreeMap<String, String>>,
}

impl AwsHandler {
    pub fn new(kind: AwsKind, connector: Arc<dyn Connect>) -> Self {
        Self {
            kind,
            connector,
            cli: None,
            arns: Mutex::new(BTreeMap::new()),
        }
    }

    fn cli(&self) -> Result<&dyn AwsCli> {
        self.cli
            .as_deref()
            .with_context(|| format!("{} handler is not initialized", self.kind.resource_type()))
    }

    fn arns(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, String>> {
        match self.arns.lock() {
            Ok(arns) => arns,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl AttributeLoader for AwsHandler {
    fn load_attributes(&self, resource: &Resource) -> Result<Attributes> {
        self.kind.load(self.cli()?, resource)
    }
}

impl ResourceHandler for AwsHandler {
    fn resource_type(&self) -> ResourceType {
        ResourceType::from(self.kind.resource_type())
    }

    fn priority(&self) -> i64 {
        self.kind.priority()
    }

    fn initialize(&mut self, session: &Session) -> Result<()> {
        self.cli = Some(self.connector.connect(session)?);
        Ok(())
    }

    fn list(&self) -> Result<Vec<Resource>> {
        let listed = self.kind.list(self.cli()?)?;
        let mut arns = self.arns();
        Ok(listed
            .into_iter()
            .map(|entry| {
                if let Some(arn) = entry.arn {
                    arns.insert(entry.resource.id.clone(), arn);
                }
                entry.resource
            })
            .collect())
    }

    fn delete(&self, resource: &Resource) -> Result<()> {
        self.kind.delete(self.cli()?, resource)
    }

    fn uses_first_seen_marker(&self) -> bool {
        self.kind.uses_first_seen_marker()
    }

    fn mark_first_seen(&self, resource: &Resource, now: DateTime<Utc>) -> Result<()> {
        let arn = self
            .arns()
            .get(&resource.id)
            .cloned()
            .with_context(|| format!("no ARN known for {}", resource.id))?;
        self.kind.mark_first_seen(self.cli()?, &arn, now)
    }
}
