//! Single-attribute predicates evaluated by the filter pipeline
//!
//! A missing creation date never satisfies a creation or age window.

use super::{AgeWindow, CreatedWindow, TagPattern};
use crate::types::Tags;
use chrono::{DateTime, Utc};
use regex::Regex;

/// True if no patterns are given, or if any pattern matches `id`
pub fn match_id(patterns: Option<&[Regex]>, id: &str) -> bool {
    match patterns {
        None | Some([]) => true,
        Some(patterns) => patterns.iter().any(|p| p.is_match(id)),
    }
}

/// True if no tag patterns are given, or if `tags` satisfies at least one
/// tag map. A map is satisfied when every key exists with a matching value.
pub fn match_tags(patterns: Option<&[TagPattern]>, tags: &Tags) -> bool {
    match patterns {
        None | Some([]) => true,
        Some(patterns) => patterns.iter().any(|p| p.matches(tags)),
    }
}

/// True if no window is given, or `created` lies strictly inside it
pub fn match_created(window: Option<&CreatedWindow>, created: Option<DateTime<Utc>>) -> bool {
    let Some(window) = window else {
        return true;
    };
    let Some(created) = created else {
        return false;
    };

    window.after.is_none_or(|after| created > after)
        && window.before.is_none_or(|before| created < before)
}

/// True if no window is given, or `created` lies inside the window measured
/// back from `now`
pub fn match_age(
    window: Option<&AgeWindow>,
    created: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> bool {
    let Some(window) = window else {
        return true;
    };
    let Some(created) = created else {
        return false;
    };

    // a cutoff before the earliest representable date admits every
    // resource as younger and none as older
    window
        .younger_than
        .is_none_or(|d| now.checked_sub_signed(d).is_none_or(|cutoff| created > cutoff))
        && window
            .older_than
            .is_none_or(|d| now.checked_sub_signed(d).is_some_and(|cutoff| created < cutoff))
}
