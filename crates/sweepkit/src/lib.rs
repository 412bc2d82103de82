//! # Sweepkit
//!
//! A filter-and-delete engine for ephemeral cloud resources.
//!
//! This crate finds resources matching declarative criteria and deletes
//! them in dependency order. It knows nothing about a particular cloud:
//! provider access goes through the [`ResourceHandler`] trait.
//!
//! ## Core Concepts
//!
//! - **Resource**: One cloud object (type, id, optional name, tags, creation date)
//! - **Registry**: Binds each resource type to its handler and dependency priority
//! - **Filters**: Compiled criteria (id regexes, tag regexes, creation window,
//!   age window, exclusions) selecting what to delete
//! - **Sweep**: Lists, filters and deletes type by type with a bounded worker pool
//!
//! ## Example
//!
//! ```ignore
//! use sweepkit::{
//!     FilterSet, Registry, Resource, ResourceHandler, ResourceType, Session,
//!     SweepOptions, AttributeLoader, sweep_simple,
//! };
//!
//! struct Buckets;
//!
//! impl AttributeLoader for Buckets {}
//!
//! impl ResourceHandler for Buckets {
//!     fn resource_type(&self) -> ResourceType { "aws_s3_bucket".into() }
//!     fn priority(&self) -> i64 { 9750 }
//!     fn list(&self) -> anyhow::Result<Vec<Resource>> {
//!         Ok(vec![Resource::new("aws_s3_bucket", "ci-artifacts").loaded()])
//!     }
//!     fn delete(&self, resource: &Resource) -> anyhow::Result<()> {
//!         println!("deleting {}", resource.id);
//!         Ok(())
//!     }
//! }
//!
//! let mut registry = Registry::new(Session::default());
//! registry.register(Box::new(Buckets))?;
//!
//! let filters = FilterSet::compile(&toml::from_str("[[aws_s3_bucket]]\nids = [\"^ci-\"]")?)?;
//! let report = sweep_simple(&registry, &filters, &SweepOptions { dry_run: true, ..Default::default() })?;
//! ```
//!
//! ## Failure model
//!
//! Configuration problems (unknown type, bad regex, bad options) fail the
//! run before any provider call. Provider failures during the run are
//! collected as warnings on the [`SweepReport`] and never abort it.

pub mod context;
pub mod duration;
pub mod error;
pub mod executor;
pub mod filter;
pub mod marker;
pub mod registry;
pub mod resource;
pub mod types;

#[cfg(test)]
mod testing;

// Re-export main types at crate root
pub use context::{NoProgress, SweepProgress};
pub use duration::{format_duration, parse_duration};
pub use error::{Error, ErrorCategory, Result};
pub use executor::{sweep, sweep_simple, validate};
pub use filter::{Filter, FilterContext, FilterSet, FilterSpec, Filters};
pub use marker::FIRST_SEEN_TAG;
pub use registry::{Registry, ResourceHandler, ResourceTypeDescriptor};
pub use resource::{AttributeLoader, Attributes, NoLoad, Resource};
pub use types::{
    DEFAULT_WORKERS, DeleteOutcome, ResourceType, Session, SweepOptions, SweepReport,
    SweepSummary, Tags,
};
