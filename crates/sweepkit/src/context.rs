//! Progress reporting for sweep runs
//!
//! The engine never writes to the terminal. Callers that want live output
//! implement [`SweepProgress`] and hand it to `sweep`.

use crate::error::Error;
use crate::resource::Resource;
use crate::types::{DeleteOutcome, ResourceType};

/// Progress callback for sweep runs
///
/// All methods are called from the thread that called `sweep`. Deletion
/// outcomes are reported once a type's batch has drained.
pub trait SweepProgress: Send {
    /// Called before a type is listed
    fn on_type_start(&mut self, resource_type: &ResourceType);

    /// Called after a successful listing
    fn on_listed(&mut self, resource_type: &ResourceType, count: usize);

    /// Called with the resources the filters selected
    fn on_matched(&mut self, resource_type: &ResourceType, matched: &[Resource]);

    /// Called for each attempted deletion (live runs only)
    fn on_deleted(&mut self, resource: &Resource, outcome: &DeleteOutcome);

    /// Called for every non-fatal error as it is recorded
    fn on_warning(&mut self, warning: &Error);

    /// Called when a type is done, whatever happened to it
    fn on_type_complete(&mut self, resource_type: &ResourceType);
}

/// No-op progress callback
pub struct NoProgress;

impl SweepProgress for NoProgress {
    fn on_type_start(&mut self, _resource_type: &ResourceType) {}
    fn on_listed(&mut self, _resource_type: &ResourceType, _count: usize) {}
    fn on_matched(&mut self, _resource_type: &ResourceType, _matched: &[Resource]) {}
    fn on_deleted(&mut self, _resource: &Resource, _outcome: &DeleteOutcome) {}
    fn on_warning(&mut self, _warning: &Error) {}
    fn on_type_complete(&mut self, _resource_type: &ResourceType) {}
}
