//! Core types shared by the registry, filter engine and executor

use crate::error::Error;
use crate::resource::Resource;
use chrono::TimeDelta;
use serde::{Deserialize, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

/// Tag map of a resource. Always present, possibly empty.
pub type Tags = BTreeMap<String, String>;

/// Resource type tag, e.g. "aws_instance" or "aws_s3_bucket"
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceType(String);

impl ResourceType {
    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ResourceType {
    fn from(tag: &str) -> Self {
        Self(tag.to_string())
    }
}

impl From<String> for ResourceType {
    fn from(tag: String) -> Self {
        Self(tag)
    }
}

/// Provider session settings handed to every handler on registration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Region the handlers operate in
    pub region: String,
    /// Named credentials profile, if any
    pub profile: Option<String>,
    /// Retry budget the provider client should use
    pub max_retries: u32,
    /// Role to assume before making calls
    pub role_to_assume: Option<String>,
    /// Free-form provider settings
    pub extra: BTreeMap<String, String>,
}

/// Default size of the deletion worker pool
pub const DEFAULT_WORKERS: usize = 10;

/// Options for a sweep run
#[derive(Debug, Clone)]
pub struct SweepOptions {
    /// Compute and report matches without deleting anything
    pub dry_run: bool,
    /// Number of deletions allowed in flight at once
    pub workers: usize,
    /// Tag resources lacking a creation date with the first-seen marker
    pub mark_first_seen: bool,
    /// Offset added to "now" when evaluating age filters
    pub time_shift: TimeDelta,
}

impl Default for SweepOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            workers: DEFAULT_WORKERS,
            mark_first_seen: false,
            time_shift: TimeDelta::zero(),
        }
    }
}

/// Outcome of a single delete call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeleteOutcome {
    /// Provider accepted the deletion
    Deleted,
    /// Provider refused or the call failed
    Failed { error: String },
}

impl DeleteOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Deleted)
    }
}

/// Counters for a sweep run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepSummary {
    /// Resource types processed
    pub types: usize,
    pub listed: usize,
    pub matched: usize,
    pub deleted: usize,
    pub failed: usize,
}

impl SweepSummary {
    pub fn add_outcome(&mut self, outcome: &DeleteOutcome) {
        match outcome {
            DeleteOutcome::Deleted => self.deleted += 1,
            DeleteOutcome::Failed { .. } => self.failed += 1,
        }
    }

    /// Merge another summary into this one
    pub fn merge(&mut self, other: &SweepSummary) {
        self.types += other.types;
        self.listed += other.listed;
        self.matched += other.matched;
        self.deleted += other.deleted;
        self.failed += other.failed;
    }

    pub fn is_success(&self) -> bool {
        self.failed == 0
    }
}

/// Result of a sweep run: what matched, what happened, what went wrong
#[derive(Debug, Default, Serialize)]
pub struct SweepReport {
    pub dry_run: bool,
    /// Every matched resource, across all types, in deletion order
    pub matched: Vec<Resource>,
    pub summary: SweepSummary,
    /// Non-fatal errors collected during the run
    #[serde(serialize_with = "serialize_warnings")]
    pub warnings: Vec<Error>,
}

impl SweepReport {
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}

fn serialize_warnings<S: Serializer>(warnings: &[Error], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_seq(warnings.iter().map(ToString::to_string))
}
