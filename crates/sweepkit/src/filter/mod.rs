//! Filter engine
//!
//! Filters are written as [`FilterSpec`]s and compiled once, up front, into
//! [`Filter`]s holding ready regexes. Compilation is where a bad pattern is
//! caught, so a run never discovers one halfway through deleting things.
//!
//! Evaluation of one [`Filter`] is a fixed pipeline over a candidate set:
//!
//! 1. `by_id` - cheap, never touches the provider
//! 2. `by_tags` - lazy-loads tags
//! 3. `by_created` - lazy-loads the creation date
//! 4. `by_age` - same, relative to the context's `now`
//! 5. `by_not` - removes whatever the nested filters match
//!
//! [`Filters`] is the OR of its entries, de-duplicated by resource id.

pub mod predicates;
pub mod spec;

pub use spec::{AgeSpec, CreatedSpec, FilterSpec};

use crate::duration;
use crate::error::{Error, Result};
use crate::resource::{AttributeLoader, Resource};
use crate::types::{ResourceType, Tags};
use chrono::{DateTime, TimeDelta, Utc};
use regex::Regex;
use std::collections::{BTreeMap, HashSet};

use predicates::{match_age, match_created, match_id, match_tags};

/// Compiled tag map: every key must be present with a matching value
#[derive(Debug, Clone)]
pub struct TagPattern {
    patterns: Vec<(String, Regex)>,
}

impl TagPattern {
    pub fn compile(map: &BTreeMap<String, String>) -> Result<Self> {
        let patterns = map
            .iter()
            .map(|(key, value)| {
                compile_regex(value, || format!("tag '{key}'")).map(|re| (key.clone(), re))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { patterns })
    }

    pub fn matches(&self, tags: &Tags) -> bool {
        self.patterns
            .iter()
            .all(|(key, re)| tags.get(key).is_some_and(|value| re.is_match(value)))
    }
}

/// Absolute creation window (exclusive bounds)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CreatedWindow {
    pub before: Option<DateTime<Utc>>,
    pub after: Option<DateTime<Utc>>,
}

/// Creation window relative to the evaluation instant
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AgeWindow {
    pub older_than: Option<TimeDelta>,
    pub younger_than: Option<TimeDelta>,
}

/// Evaluation state shared by every filter of one pipeline run
pub struct FilterContext<'a> {
    loader: &'a dyn AttributeLoader,
    now: DateTime<Utc>,
    warnings: Vec<Error>,
}

impl<'a> FilterContext<'a> {
    pub fn new(loader: &'a dyn AttributeLoader, now: DateTime<Utc>) -> Self {
        Self {
            loader,
            now,
            warnings: Vec::new(),
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.now
    }

    /// Lazy-load warnings collected so far
    pub fn warnings(&self) -> &[Error] {
        &self.warnings
    }

    pub fn into_warnings(self) -> Vec<Error> {
        self.warnings
    }

    fn ensure_loaded(&mut self, resource: &mut Resource) {
        if let Err(e) = resource.ensure_loaded(self.loader) {
            log::warn!("{e}");
            self.warnings.push(e);
        }
    }
}

/// A compiled filter entry
#[derive(Debug, Clone)]
pub struct Filter {
    ids: Option<Vec<Regex>>,
    tags: Option<Vec<TagPattern>>,
    created: Option<CreatedWindow>,
    age: Option<AgeWindow>,
    not: Option<Filters>,
    spec: FilterSpec,
}

impl Filter {
    /// Compile a filter entry, validating every pattern
    pub fn compile(spec: &FilterSpec) -> Result<Self> {
        let ids = spec
            .ids
            .as_ref()
            .map(|ids| {
                ids.iter()
                    .map(|p| compile_regex(p, || "id".to_string()))
                    .collect::<Result<Vec<_>>>()
            })
            .transpose()?;

        let tags = spec
            .tags
            .as_ref()
            .map(|maps| maps.iter().map(TagPattern::compile).collect::<Result<Vec<_>>>())
            .transpose()?;

        let age = spec
            .age
            .map(|a| -> Result<AgeWindow> {
                Ok(AgeWindow {
                    older_than: a
                        .older_than
                        .map(|d| duration::check_age("older_than", d))
                        .transpose()?,
                    younger_than: a
                        .younger_than
                        .map(|d| duration::check_age("younger_than", d))
                        .transpose()?,
                })
            })
            .transpose()?;

        let not = spec.not.as_deref().map(Filters::compile).transpose()?;

        Ok(Self {
            ids,
            tags,
            created: spec.created.map(|c| CreatedWindow {
                before: c.before,
                after: c.after,
            }),
            age,
            not,
            spec: spec.clone(),
        })
    }

    /// Resources matched by this filter, in their original order
    pub fn apply(&self, resources: Vec<Resource>, ctx: &mut FilterContext<'_>) -> Vec<Resource> {
        let mut pool = resources;
        let all = (0..pool.len()).collect();
        let selected = self.select(&mut pool, all, ctx);
        take_selected(pool, &selected)
    }

    fn select(
        &self,
        pool: &mut [Resource],
        candidates: Vec<usize>,
        ctx: &mut FilterContext<'_>,
    ) -> Vec<usize> {
        log::debug!("Applying filter {} to {} resources", self.spec, candidates.len());

        let candidates = self.by_ids(pool, candidates);
        let candidates = self.by_tags(pool, candidates, ctx);
        let candidates = self.by_created(pool, candidates, ctx);
        let candidates = self.by_age(pool, candidates, ctx);
        self.by_not(pool, candidates, ctx)
    }

    fn by_ids(&self, pool: &[Resource], candidates: Vec<usize>) -> Vec<usize> {
        let Some(ids) = self.ids.as_deref().filter(|ids| !ids.is_empty()) else {
            return candidates;
        };
        let before = candidates.len();
        let kept: Vec<usize> = candidates
            .into_iter()
            .filter(|&i| match_id(Some(ids), &pool[i].id))
            .collect();
        log::debug!("Filtered by id: {before} -> {}", kept.len());
        kept
    }

    fn by_tags(
        &self,
        pool: &mut [Resource],
        candidates: Vec<usize>,
        ctx: &mut FilterContext<'_>,
    ) -> Vec<usize> {
        let Some(tags) = self.tags.as_deref().filter(|t| !t.is_empty()) else {
            return candidates;
        };
        let before = candidates.len();
        let kept: Vec<usize> = candidates
            .into_iter()
            .filter(|&i| {
                ctx.ensure_loaded(&mut pool[i]);
                match_tags(Some(tags), &pool[i].tags)
            })
            .collect();
        log::debug!("Filtered by tags: {before} -> {}", kept.len());
        kept
    }

    fn by_created(
        &self,
        pool: &mut [Resource],
        candidates: Vec<usize>,
        ctx: &mut FilterContext<'_>,
    ) -> Vec<usize> {
        let Some(window) = self.created.as_ref() else {
            return candidates;
        };
        let before = candidates.len();
        let kept: Vec<usize> = candidates
            .into_iter()
            .filter(|&i| {
                ctx.ensure_loaded(&mut pool[i]);
                let r = &pool[i];
                if r.created.is_none() {
                    log::debug!("{} '{}' has no creation date", r.resource_type, r.id);
                }
                match_created(Some(window), r.created)
            })
            .collect();
        log::debug!("Filtered by created: {before} -> {}", kept.len());
        kept
    }

    fn by_age(
        &self,
        pool: &mut [Resource],
        candidates: Vec<usize>,
        ctx: &mut FilterContext<'_>,
    ) -> Vec<usize> {
        let Some(window) = self.age.as_ref() else {
            return candidates;
        };
        let now = ctx.now();
        let before = candidates.len();
        let kept: Vec<usize> = candidates
            .into_iter()
            .filter(|&i| {
                ctx.ensure_loaded(&mut pool[i]);
                match_age(Some(window), pool[i].created, now)
            })
            .collect();
        log::debug!("Filtered by age: {before} -> {}", kept.len());
        kept
    }

    fn by_not(
        &self,
        pool: &mut [Resource],
        candidates: Vec<usize>,
        ctx: &mut FilterContext<'_>,
    ) -> Vec<usize> {
        let Some(not) = self.not.as_ref().filter(|n| !n.is_empty()) else {
            return candidates;
        };
        let excluded: HashSet<String> = not
            .select(pool, candidates.clone(), ctx)
            .into_iter()
            .map(|i| pool[i].id.clone())
            .collect();
        log::debug!("'not' filter excludes {} resources", excluded.len());

        candidates
            .into_iter()
            .filter(|&i| !excluded.contains(&pool[i].id))
            .collect()
    }
}

/// OR of filter entries. Empty means "everything".
#[derive(Debug, Clone, Default)]
pub struct Filters(Vec<Filter>);

impl Filters {
    pub fn compile(specs: &[FilterSpec]) -> Result<Self> {
        specs
            .iter()
            .map(Filter::compile)
            .collect::<Result<Vec<_>>>()
            .map(Self)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Filter> {
        self.0.iter()
    }

    /// Resources matched by any entry, each at most once, in original order
    pub fn apply(&self, resources: Vec<Resource>, ctx: &mut FilterContext<'_>) -> Vec<Resource> {
        let mut pool = resources;
        let all = (0..pool.len()).collect();
        let selected = self.select(&mut pool, all, ctx);
        take_selected(pool, &selected)
    }

    fn select(
        &self,
        pool: &mut [Resource],
        candidates: Vec<usize>,
        ctx: &mut FilterContext<'_>,
    ) -> Vec<usize> {
        if self.0.is_empty() {
            return candidates;
        }

        let mut seen = HashSet::new();
        let mut selected = Vec::new();
        for filter in &self.0 {
            for i in filter.select(pool, candidates.clone(), ctx) {
                if seen.insert(pool[i].id.clone()) {
                    selected.push(i);
                }
            }
        }
        selected.sort_unstable();
        selected
    }
}

/// Compiled filters for every configured resource type
#[derive(Debug, Clone, Default)]
pub struct FilterSet {
    filters: BTreeMap<ResourceType, Filters>,
}

impl FilterSet {
    /// Compile the `type -> [filter]` section of a config.
    ///
    /// Pattern errors name the resource type they belong to.
    pub fn compile<K>(specs: &BTreeMap<K, Vec<FilterSpec>>) -> Result<Self>
    where
        K: Clone + Into<ResourceType>,
    {
        let mut filters = BTreeMap::new();
        for (key, entries) in specs {
            let resource_type: ResourceType = key.clone().into();
            let compiled = Filters::compile(entries).map_err(|e| match e {
                Error::FilterCompile {
                    field,
                    pattern,
                    source,
                } => Error::FilterCompile {
                    field: format!("{resource_type} {field}"),
                    pattern,
                    source,
                },
                other => other,
            })?;
            filters.insert(resource_type, compiled);
        }
        Ok(Self { filters })
    }

    /// Configured resource types (unordered; see `Registry::ordered_types`)
    pub fn types(&self) -> impl Iterator<Item = &ResourceType> {
        self.filters.keys()
    }

    pub fn get(&self, resource_type: &ResourceType) -> Option<&Filters> {
        self.filters.get(resource_type)
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }
}

fn compile_regex(pattern: &str, field: impl FnOnce() -> String) -> Result<Regex> {
    Regex::new(pattern).map_err(|source| Error::FilterCompile {
        field: field(),
        pattern: pattern.to_string(),
        source,
    })
}

fn take_selected(pool: Vec<Resource>, selected: &[usize]) -> Vec<Resource> {
    let mut keep = vec![false; pool.len()];
    for &i in selected {
        keep[i] = true;
    }
    pool.into_iter()
        .zip(keep)
        .filter_map(|(r, k)| k.then_some(r))
        .collect()
}
