//! Deletion orchestrator - lists, filters and deletes type by type

use crate::context::{NoProgress, SweepProgress};
use crate::duration;
use crate::error::{Error, Result};
use crate::filter::{FilterContext, FilterSet};
use crate::marker::{self, FIRST_SEEN_TAG};
use crate::registry::{Registry, ResourceHandler};
use crate::resource::Resource;
use crate::types::{DeleteOutcome, ResourceType, SweepOptions, SweepReport};
use chrono::{DateTime, Utc};
use rayon::prelude::*;
use std::sync::Arc;

/// Check a run configuration without touching the provider.
///
/// Fails on a zero-sized worker pool, an out-of-range time shift, or a
/// filtered type with no handler.
pub fn validate(registry: &Registry, filters: &FilterSet, options: &SweepOptions) -> Result<()> {
    if options.workers == 0 {
        return Err(Error::InvalidOptions(
            "workers must be at least 1".to_string(),
        ));
    }
    duration::check_range(options.time_shift)
        .map_err(|e| Error::InvalidOptions(format!("time_shift: {e}")))?;
    for resource_type in filters.types() {
        if !registry.is_registered(resource_type) {
            return Err(Error::UnsupportedResourceType(resource_type.clone()));
        }
    }
    Ok(())
}

/// Run a sweep
///
/// Types are processed one at a time in dependency order. In a live run
/// every deletion of a type has finished before the next type is listed.
///
/// # Returns
/// The report of what matched and what happened. Only configuration
/// problems are returned as `Err`; provider failures end up in
/// [`SweepReport::warnings`].
pub fn sweep<P: SweepProgress>(
    registry: &Registry,
    filters: &FilterSet,
    options: &SweepOptions,
    progress: &mut P,
) -> Result<SweepReport> {
    validate(registry, filters, options)?;

    let ordered = registry.ordered_types(filters.types());
    log::info!(
        "Sweeping {} resource types{}",
        ordered.len(),
        if options.dry_run { " (dry run)" } else { "" }
    );

    let pool = if options.dry_run {
        None
    } else {
        Some(
            rayon::ThreadPoolBuilder::new()
                .num_threads(options.workers)
                .build()
                .map_err(|e| Error::ThreadPool(e.to_string()))?,
        )
    };

    let now = Utc::now()
        .checked_add_signed(options.time_shift)
        .ok_or_else(|| Error::InvalidOptions("time_shift is out of range".to_string()))?;
    let mut report = SweepReport {
        dry_run: options.dry_run,
        ..Default::default()
    };

    for resource_type in &ordered {
        progress.on_type_start(resource_type);
        let handler = registry.handler(resource_type)?;
        let mut run = TypeRun {
            resource_type,
            handler,
            report: &mut report,
            progress: &mut *progress,
        };
        run.execute(filters, options, pool.as_ref(), now);
        progress.on_type_complete(resource_type);
    }

    log::info!(
        "Sweep finished: {} listed, {} matched, {} deleted, {} failed",
        report.summary.listed,
        report.summary.matched,
        report.summary.deleted,
        report.summary.failed
    );
    Ok(report)
}

/// Run a sweep without progress callbacks
pub fn sweep_simple(
    registry: &Registry,
    filters: &FilterSet,
    options: &SweepOptions,
) -> Result<SweepReport> {
    sweep(registry, filters, options, &mut NoProgress)
}

/// State of one resource type inside a run
struct TypeRun<'a, P: SweepProgress> {
    resource_type: &'a ResourceType,
    handler: &'a Arc<dyn ResourceHandler>,
    report: &'a mut SweepReport,
    progress: &'a mut P,
}

impl<P: SweepProgress> TypeRun<'_, P> {
    fn execute(
        &mut self,
        filters: &FilterSet,
        options: &SweepOptions,
        pool: Option<&rayon::ThreadPool>,
        now: DateTime<Utc>,
    ) {
        let Some(listed) = self.list() else {
            return;
        };

        let mut listed = listed;
        if options.mark_first_seen && !options.dry_run && self.handler.uses_first_seen_marker() {
            self.mark_first_seen(&mut listed);
        }

        let matched = self.filter(listed, filters, now);
        self.report.summary.matched += matched.len();
        self.progress.on_matched(self.resource_type, &matched);

        match pool {
            Some(pool) if !matched.is_empty() => self.delete(&matched, pool),
            _ if options.dry_run => {
                log::info!("Dry run: would delete {} {}", matched.len(), self.resource_type);
            }
            _ => {}
        }

        self.report.matched.extend(matched);
    }

    fn list(&mut self) -> Option<Vec<Resource>> {
        log::debug!("Listing {}", self.resource_type);
        let listed = match self.handler.list() {
            Ok(listed) => listed,
            Err(e) => {
                self.warn(Error::list(self.resource_type, &e));
                return None;
            }
        };
        self.report.summary.types += 1;
        self.report.summary.listed += listed.len();
        self.progress.on_listed(self.resource_type, listed.len());

        let (valid, missing): (Vec<_>, Vec<_>) =
            listed.into_iter().partition(|r| !r.id.is_empty());
        for _ in &missing {
            self.warn(Error::MissingResourceId {
                resource_type: self.resource_type.clone(),
            });
        }
        Some(valid)
    }

    /// Tag every resource that has neither a creation date nor a marker
    fn mark_first_seen(&mut self, listed: &mut [Resource]) {
        let seen_at = Utc::now();
        for resource in listed.iter_mut() {
            if let Err(e) = resource.ensure_loaded(&**self.handler) {
                self.warn(e);
            }
            if resource.created.is_some() || resource.tags.contains_key(FIRST_SEEN_TAG) {
                continue;
            }

            log::debug!("Marking {} '{}' as first seen", self.resource_type, resource.id);
            match self.handler.mark_first_seen(resource, seen_at) {
                Ok(()) => {
                    resource
                        .tags
                        .insert(FIRST_SEEN_TAG.to_string(), marker::marker_value(seen_at));
                    resource.created = Some(seen_at);
                }
                Err(e) => self.warn(Error::FirstSeenMarker {
                    resource_type: self.resource_type.clone(),
                    id: resource.id.clone(),
                    message: format!("{e:#}"),
                }),
            }
        }
    }

    fn filter(
        &mut self,
        listed: Vec<Resource>,
        filters: &FilterSet,
        now: DateTime<Utc>,
    ) -> Vec<Resource> {
        let before = listed.len();
        let Some(type_filters) = filters.get(self.resource_type) else {
            return listed;
        };

        let handler = self.handler;
        let mut ctx = FilterContext::new(&**handler, now);
        let matched = type_filters.apply(listed, &mut ctx);
        for warning in ctx.into_warnings() {
            self.progress.on_warning(&warning);
            self.report.warnings.push(warning);
        }

        log::debug!(
            "{}: {} resources before filtering, {} after",
            self.resource_type,
            before,
            matched.len()
        );
        matched
    }

    fn delete(&mut self, matched: &[Resource], pool: &rayon::ThreadPool) {
        log::info!("Deleting {} {}", matched.len(), self.resource_type);

        let handler = self.handler;
        let resource_type = self.resource_type;
        // install() blocks until the whole batch has drained
        let results: Vec<std::result::Result<(), Error>> = pool.install(|| {
            matched
                .par_iter()
                .map(|resource| {
                    handler
                        .delete(resource)
                        .map_err(|e| Error::delete(resource_type, &resource.id, &e))
                })
                .collect()
        });

        for (resource, result) in matched.iter().zip(results) {
            let outcome = match result {
                Ok(()) => {
                    log::debug!("Deleted {} '{}'", resource_type, resource.id);
                    DeleteOutcome::Deleted
                }
                Err(e) => {
                    let outcome = DeleteOutcome::Failed {
                        error: e.to_string(),
                    };
                    self.warn(e);
                    outcome
                }
            };
            self.report.summary.add_outcome(&outcome);
            self.progress.on_deleted(resource, &outcome);
        }
    }

    fn warn(&mut self, warning: Error) {
        log::warn!("{warning}");
        self.progress.on_warning(&warning);
        self.report.warnings.push(warning);
    }
}
