//! Error types for sweep runs.
//!
//! Errors fall into two groups. Fatal errors come out of configuration
//! validation and stop a run before any listing or deletion happens.
//! Everything a provider reports while the run is in flight is recoverable:
//! it is recorded as a warning on the report and sibling work continues.

use crate::types::ResourceType;
use thiserror::Error;

/// Broad categories of sweep errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Bad configuration (unknown type, invalid pattern, invalid option)
    Config,
    /// A provider call failed (list, delete, attribute load, marker write)
    Provider,
    /// Engine-level failure unrelated to config or provider
    Internal,
}

impl ErrorCategory {
    /// Get a user-friendly description of this category.
    pub fn description(&self) -> &'static str {
        match self {
            Self::Config => "Configuration error",
            Self::Provider => "Provider error",
            Self::Internal => "Internal error",
        }
    }
}

/// Errors that can occur while validating or running a sweep.
#[derive(Debug, Error)]
pub enum Error {
    /// A filter references a resource type with no registered handler
    #[error("unsupported resource type found in config: {0}")]
    UnsupportedResourceType(ResourceType),

    /// A regex in a filter does not compile
    #[error("invalid {field} pattern '{pattern}': {source}")]
    FilterCompile {
        /// Which part of the filter held the pattern ("id" or "tag <key>")
        field: String,
        /// The offending pattern
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// A duration string could not be parsed
    #[error("invalid duration '{value}': {reason}")]
    InvalidDuration { value: String, reason: String },

    /// Run options are out of range
    #[error("invalid options: {0}")]
    InvalidOptions(String),

    /// Two handlers claim the same type tag
    #[error("resource type registered twice: {0}")]
    DuplicateResourceType(ResourceType),

    /// Two handlers claim the same dependency priority
    #[error("priority {priority} of {new} already used by {existing}")]
    DuplicatePriority {
        priority: i64,
        existing: ResourceType,
        new: ResourceType,
    },

    /// Handler setup failed
    #[error("failed to initialize handler for {resource_type}: {message}")]
    Initialize {
        resource_type: ResourceType,
        message: String,
    },

    /// Deletion pool could not be created
    #[error("failed to create deletion pool: {0}")]
    ThreadPool(String),

    /// Listing a resource type failed
    #[error("failed to list {resource_type}: {message}")]
    ProviderList {
        resource_type: ResourceType,
        message: String,
    },

    /// Deleting a single resource failed
    #[error("failed to delete {resource_type} '{id}': {message}")]
    ProviderDelete {
        resource_type: ResourceType,
        id: String,
        message: String,
    },

    /// Loading tags or creation date for a resource failed
    #[error("failed to load attributes of {resource_type} '{id}': {message}")]
    LazyLoad {
        resource_type: ResourceType,
        id: String,
        message: String,
    },

    /// Writing the first-seen marker tag failed
    #[error("failed to mark {resource_type} '{id}' as first seen: {message}")]
    FirstSeenMarker {
        resource_type: ResourceType,
        id: String,
        message: String,
    },

    /// A listed resource came back without an identifier
    #[error("{resource_type} listing returned a resource without an id")]
    MissingResourceId { resource_type: ResourceType },
}

impl Error {
    /// Get the category for this error.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::UnsupportedResourceType(_)
            | Self::FilterCompile { .. }
            | Self::InvalidDuration { .. }
            | Self::InvalidOptions(_)
            | Self::DuplicateResourceType(_)
            | Self::DuplicatePriority { .. } => ErrorCategory::Config,
            Self::Initialize { .. }
            | Self::ProviderList { .. }
            | Self::ProviderDelete { .. }
            | Self::LazyLoad { .. }
            | Self::FirstSeenMarker { .. }
            | Self::MissingResourceId { .. } => ErrorCategory::Provider,
            Self::ThreadPool(_) => ErrorCategory::Internal,
        }
    }

    /// Whether this error stops a run before it starts.
    ///
    /// Non-fatal errors are only ever reported as warnings.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            Self::ProviderList { .. }
                | Self::ProviderDelete { .. }
                | Self::LazyLoad { .. }
                | Self::FirstSeenMarker { .. }
                | Self::MissingResourceId { .. }
        )
    }

    /// The resource type this error concerns, if any.
    pub fn resource_type(&self) -> Option<&ResourceType> {
        match self {
            Self::UnsupportedResourceType(t) | Self::DuplicateResourceType(t) => Some(t),
            Self::DuplicatePriority { new, .. } => Some(new),
            Self::Initialize { resource_type, .. }
            | Self::ProviderList { resource_type, .. }
            | Self::ProviderDelete { resource_type, .. }
            | Self::LazyLoad { resource_type, .. }
            | Self::FirstSeenMarker { resource_type, .. }
            | Self::MissingResourceId { resource_type } => Some(resource_type),
            _ => None,
        }
    }

    pub(crate) fn list(resource_type: &ResourceType, err: &anyhow::Error) -> Self {
        Self::ProviderList {
            resource_type: resource_type.clone(),
            message: format!("{err:#}"),
        }
    }

    pub(crate) fn delete(resource_type: &ResourceType, id: &str, err: &anyhow::Error) -> Self {
        Self::ProviderDelete {
            resource_type: resource_type.clone(),
            id: id.to_string(),
            message: format!("{err:#}"),
        }
    }
}

/// Result type for sweep operations.
pub type Result<T> = std::result::Result<T, Error>;
