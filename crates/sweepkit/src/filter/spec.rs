//! Filter configuration as written in the config file

use crate::duration;
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// One filter entry for a resource type.
///
/// Every present field must match (AND), except `not`, whose matches are
/// removed from the result.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FilterSpec {
    /// Regexes matched against the resource id (any may match)
    #[serde(default, alias = "id", skip_serializing_if = "Option::is_none")]
    pub ids: Option<Vec<String>>,

    /// Tag maps of key -> value regex (any map may match, all keys of a map must)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<BTreeMap<String, String>>>,

    /// Absolute creation window
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<CreatedSpec>,

    /// Creation window relative to now
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age: Option<AgeSpec>,

    /// Filters whose matches are excluded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub not: Option<Vec<FilterSpec>>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreatedSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub before: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub after: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AgeSpec {
    #[serde(
        default,
        with = "duration::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub older_than: Option<TimeDelta>,
    #[serde(
        default,
        with = "duration::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub younger_than: Option<TimeDelta>,
}

impl FilterSpec {
    /// Whether this entry has no criteria at all
    pub fn is_empty(&self) -> bool {
        self.ids.is_none()
            && self.tags.is_none()
            && self.created.is_none()
            && self.age.is_none()
            && self.not.is_none()
    }
}

impl fmt::Display for FilterSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if let Some(ids) = &self.ids {
            parts.push(format!("ids:[{}]", ids.join(",")));
        }
        if let Some(tags) = &self.tags {
            let maps: Vec<String> = tags
                .iter()
                .map(|m| {
                    let pairs: Vec<String> = m.iter().map(|(k, v)| format!("{k}={v}")).collect();
                    format!("({})", pairs.join(","))
                })
                .collect();
            parts.push(format!("tags:[{}]", maps.join(",")));
        }
        if let Some(created) = &self.created {
            if let Some(after) = created.after {
                parts.push(format!("after:{}", after.to_rfc3339()));
            }
            if let Some(before) = created.before {
                parts.push(format!("before:{}", before.to_rfc3339()));
            }
        }
        if let Some(age) = &self.age {
            if let Some(d) = age.younger_than {
                parts.push(format!("younger_than:{}", duration::format_duration(d)));
            }
            if let Some(d) = age.older_than {
                parts.push(format!("older_than:{}", duration::format_duration(d)));
            }
        }
        if let Some(not) = &self.not {
            let nested: Vec<String> = not.iter().map(ToString::to_string).collect();
            parts.push(format!("not:{{{}}}", nested.join("; ")));
        }
        if parts.is_empty() {
            f.write_str("<all>")
        } else {
            f.write_str(&parts.join(", "))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_filter() {
        let toml = r#"
ids = ["^i-0"]
tags = [{ env = "^test", owner = "ci" }]
created = { after = "2024-01-01T00:00:00Z" }
age = { older_than = "24h" }
not = [{ tags = [{ keep = "true" }] }]
"#;
        let spec: FilterSpec = toml::from_str(toml).unwrap();
        assert_eq!(spec.ids.as_deref(), Some(&["^i-0".to_string()][..]));
        assert_eq!(spec.tags.as_ref().unwrap()[0].len(), 2);
        assert!(spec.created.unwrap().after.is_some());
        assert_eq!(spec.age.unwrap().older_than, Some(TimeDelta::hours(24)));
        assert_eq!(spec.not.as_ref().unwrap().len(), 1);
    }

    #[test]
    fn test_id_alias_and_unknown_fields() {
        let spec: FilterSpec = toml::from_str(r#"id = ["abc"]"#).unwrap();
        assert!(spec.ids.is_some());
        assert!(toml::from_str::<FilterSpec>(r#"idz = ["abc"]"#).is_err());
    }

    #[test]
    fn test_bad_duration_is_a_parse_error() {
        let err = toml::from_str::<FilterSpec>(r#"age = { older_than = "soon" }"#).unwrap_err();
        assert!(err.to_string().contains("invalid duration"));
    }

    #[test]
    fn test_display() {
        let spec: FilterSpec =
            toml::from_str(r#"ids = ["a", "b"]
age = { older_than = "26h" }"#)
                .unwrap();
        assert_eq!(spec.to_string(), "ids:[a,b], older_than:1d2h");
        assert_eq!(FilterSpec::default().to_string(), "<all>");
    }
}
