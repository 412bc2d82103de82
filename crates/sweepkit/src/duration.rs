//! Human-readable durations for age filters ("90m", "24h", "7d", "1h30m")

use crate::error::{Error, Result};
use chrono::TimeDelta;
use serde::{Deserialize, Deserializer, Serializer};

const MINUTE: i64 = 60;
const HOUR: i64 = MINUTE * 60;
const DAY: i64 = HOUR * 24;
const WEEK: i64 = DAY * 7;

/// Longest duration accepted in either direction (10000 years), well inside
/// the range of dates chrono can represent
pub const MAX_DURATION_SECS: i64 = 10_000 * 365 * DAY;

/// Parse a duration string.
///
/// Accepts one or more `<integer><unit>` groups, units `s`, `m`, `h`, `d`,
/// `w` (case-insensitive). A bare `0` is zero. A leading `-` negates the
/// whole value, which only makes sense for time shifts.
pub fn parse_duration(input: &str) -> Result<TimeDelta> {
    let invalid = |reason: &str| Error::InvalidDuration {
        value: input.to_string(),
        reason: reason.to_string(),
    };

    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(invalid("empty duration"));
    }
    if trimmed == "0" {
        return Ok(TimeDelta::zero());
    }

    let (negative, body) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, trimmed),
    };

    let mut total: i64 = 0;
    let mut digits = String::new();
    for c in body.chars() {
        if c.is_ascii_digit() {
            digits.push(c);
            continue;
        }
        if digits.is_empty() {
            return Err(invalid("expected a number before each unit"));
        }
        let unit = match c.to_ascii_lowercase() {
            's' => 1,
            'm' => MINUTE,
            'h' => HOUR,
            'd' => DAY,
            'w' => WEEK,
            _ => return Err(invalid("unknown unit, use s, m, h, d or w")),
        };
        let value: i64 = digits.parse().map_err(|_| invalid("number too large"))?;
        total = value
            .checked_mul(unit)
            .and_then(|secs| total.checked_add(secs))
            .ok_or_else(|| invalid("duration too large"))?;
        digits.clear();
    }
    if !digits.is_empty() {
        return Err(invalid("missing unit after number"));
    }

    if total > MAX_DURATION_SECS {
        return Err(invalid("duration too large, the limit is 10000 years"));
    }
    let secs = if negative { -total } else { total };
    TimeDelta::try_seconds(secs).ok_or_else(|| invalid("duration too large"))
}

/// Reject durations beyond [`MAX_DURATION_SECS`] in either direction
pub fn check_range(delta: TimeDelta) -> Result<TimeDelta> {
    if delta.num_seconds().unsigned_abs() > MAX_DURATION_SECS.unsigned_abs() {
        return Err(Error::InvalidDuration {
            value: format_duration(delta),
            reason: "duration too large, the limit is 10000 years".to_string(),
        });
    }
    Ok(delta)
}

/// Age bounds count back from "now", so they must not be negative
pub fn check_age(field: &str, delta: TimeDelta) -> Result<TimeDelta> {
    if delta < TimeDelta::zero() {
        return Err(Error::InvalidDuration {
            value: format_duration(delta),
            reason: format!("{field} must not be negative"),
        });
    }
    check_range(delta)
}

/// Render a duration in the largest whole units, e.g. "1d2h"
pub fn format_duration(delta: TimeDelta) -> String {
    let mut secs = delta.num_seconds();
    if secs == 0 {
        return "0s".to_string();
    }
    let mut out = String::new();
    if secs < 0 {
        out.push('-');
        secs = -secs;
    }
    for (unit, suffix) in [(WEEK, 'w'), (DAY, 'd'), (HOUR, 'h'), (MINUTE, 'm'), (1, 's')] {
        if secs >= unit {
            out.push_str(&(secs / unit).to_string());
            out.push(suffix);
            secs %= unit;
        }
    }
    out
}

/// Serde adapter for `Option<TimeDelta>` fields written as duration strings
pub mod option {
    use super::*;

    pub fn serialize<S: Serializer>(
        value: &Option<TimeDelta>,
        serializer: S,
    ) -> std::result::Result<S::Ok, S::Error> {
        match value {
            Some(delta) => serializer.serialize_some(&format_duration(*delta)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> std::result::Result<Option<TimeDelta>, D::Error> {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        raw.map(|s| parse_duration(&s).map_err(serde::de::Error::custom))
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_units() {
        assert_eq!(parse_duration("30s").unwrap(), TimeDelta::seconds(30));
        assert_eq!(parse_duration("90m").unwrap(), TimeDelta::minutes(90));
        assert_eq!(parse_duration("24h").unwrap(), TimeDelta::hours(24));
        assert_eq!(parse_duration("7d").unwrap(), TimeDelta::days(7));
        assert_eq!(parse_duration("2W").unwrap(), TimeDelta::weeks(2));
    }

    #[test]
    fn test_parse_compound_and_negative() {
        assert_eq!(
            parse_duration("1h30m").unwrap(),
            TimeDelta::minutes(90)
        );
        assert_eq!(parse_duration("-2h").unwrap(), TimeDelta::hours(-2));
        assert_eq!(parse_duration("0").unwrap(), TimeDelta::zero());
    }

    #[test]
    fn test_parse_rejects_garbage() {
        for bad in ["", "h", "24", "3x", "1.5h", "--1h"] {
            assert!(parse_duration(bad).is_err(), "{bad} should be rejected");
        }
    }

    #[test]
    fn test_parse_rejects_out_of_range() {
        assert!(parse_duration("100000000d").is_err());
        assert!(parse_duration("-100000000d").is_err());
        assert!(parse_duration("520000w").is_ok());
    }

    #[test]
    fn test_check_age() {
        assert_eq!(
            check_age("older_than", TimeDelta::hours(2)).unwrap(),
            TimeDelta::hours(2)
        );
        assert!(check_age("older_than", TimeDelta::zero()).is_ok());

        let err = check_age("older_than", TimeDelta::hours(-2)).unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid duration '-2h': older_than must not be negative"
        );
        assert!(check_age("younger_than", TimeDelta::days(5_000_000)).is_err());
        assert!(check_range(TimeDelta::days(-5_000_000)).is_err());
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(TimeDelta::hours(26)), "1d2h");
        assert_eq!(format_duration(TimeDelta::zero()), "0s");
        assert_eq!(format_duration(TimeDelta::minutes(-90)), "-1h30m");
    }
}
