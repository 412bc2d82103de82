//! Scripted `AwsCli` for tests

use super::{AwsCli, Connect};
use anyhow::Result;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use sweepkit::Session;

/// Canned responses keyed by "service operation", optionally followed by
/// the arguments for a per-call override
#[derive(Default)]
pub struct FakeCli {
    responses: BTreeMap<String, std::result::Result<Value, String>>,
    calls: Mutex<Vec<String>>,
}

impl FakeCli {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(mut self, service: &str, operation: &str, value: Value) -> Self {
        self.responses
            .insert(format!("{service} {operation}"), Ok(value));
        self
    }

    /// Response for one exact command line, e.g. `s3api get-bucket-tagging --bucket a`
    pub fn respond_to(mut self, command: &str, value: Value) -> Self {
        self.responses.insert(command.to_string(), Ok(value));
        self
    }

    pub fn fail(mut self, command: &str, message: &str) -> Self {
        self.responses
            .insert(command.to_string(), Err(message.to_string()));
        self
    }

    /// Every command line seen so far, in call order
    pub fn calls(&self) -> Vec<String> {
        match self.calls.lock() {
            Ok(calls) => calls.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl AwsCli for FakeCli {
    fn call(&self, service: &str, operation: &str, args: &[&str]) -> Result<Value> {
        let base = format!("{service} {operation}");
        let full = if args.is_empty() {
            base.clone()
        } else {
            format!("{base} {}", args.join(" "))
        };
        match self.calls.lock() {
            Ok(mut calls) => calls.push(full.clone()),
            Err(poisoned) => poisoned.into_inner().push(full.clone()),
        }

        match self.responses.get(&full).or_else(|| self.responses.get(&base)) {
            Some(Ok(value)) => Ok(value.clone()),
            Some(Err(message)) => anyhow::bail!("{message}"),
            None => Ok(Value::Null),
        }
    }
}

/// Connector handing out one shared fake
pub struct FakeConnector(Arc<FakeCli>);

impl FakeConnector {
    pub fn new(cli: Arc<FakeCli>) -> Self {
        Self(cli)
    }
}

impl Connect for FakeConnector {
    fn connect(&self, _session: &Session) -> Result<Arc<dyn AwsCli>> {
        let cli: Arc<dyn AwsCli> = self.0.clone();
        Ok(cli)
    }
}
