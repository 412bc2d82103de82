//! First-seen marker tag
//!
//! Some resource kinds carry no creation timestamp. For those, a provider
//! can write this tag the first time a run observes the resource; later runs
//! read it back as a stand-in creation date so age filters still work.

use crate::types::Tags;
use chrono::{DateTime, SecondsFormat, Utc};

/// Tag key holding the first-seen timestamp (RFC 3339)
pub const FIRST_SEEN_TAG: &str = "cloudsweep:first-seen-date";

/// Read the first-seen timestamp from a tag map, if present and well formed
pub fn first_seen(tags: &Tags) -> Option<DateTime<Utc>> {
    let value = tags.get(FIRST_SEEN_TAG)?;
    match DateTime::parse_from_rfc3339(value) {
        Ok(ts) => Some(ts.with_timezone(&Utc)),
        Err(e) => {
            log::warn!("Ignoring malformed {FIRST_SEEN_TAG} tag '{value}': {e}");
            None
        }
    }
}

/// Tag value to write for a resource first seen at `now`
pub fn marker_value(now: DateTime<Utc>) -> String {
    now.to_rfc3339_opts(SecondsFormat::Secs, true)
}
