use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};

use crate::error::{LogError, Result};

/// Datetime shapes accepted by [`parse_timestamp`], in priority order
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.fZ",
    "%Y-%m-%dT%H:%M:%SZ",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
];

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Length of a bare `YYYY-MM-DD` date
const BARE_DATE_LEN: usize = 10;

/// Parse a log or user-supplied timestamp into a UTC instant
///
/// A bare date parses to midnight of that day.
pub fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    for format in DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return Some(naive.and_utc());
        }
    }

    NaiveDate::parse_from_str(text, DATE_FORMAT)
        .ok()
        .map(|date| date.and_time(NaiveTime::MIN).and_utc())
}

/// Parse an end bound; a bare date is widened to the last millisecond of the day
fn parse_end_bound(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if text.len() == BARE_DATE_LEN {
        let date = NaiveDate::parse_from_str(text, DATE_FORMAT).ok()?;
        let end_of_day = NaiveTime::from_hms_milli_opt(23, 59, 59, 999)?;
        return Some(date.and_time(end_of_day).and_utc());
    }
    parse_timestamp(text)
}

/// Inclusive calendar range, either side optional
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DateRange {
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
}

impl DateRange {
    /// Build a range from optional textual bounds
    ///
    /// Fails with [`LogError::InvalidDate`] when a supplied bound is not a
    /// recognized timestamp shape.
    pub fn parse(start: Option<&str>, end: Option<&str>) -> Result<Self> {
        let start = match start {
            Some(text) => Some(parse_timestamp(text).ok_or_else(|| LogError::InvalidDate {
                value: text.to_string(),
            })?),
            None => None,
        };
        let end = match end {
            Some(text) => Some(parse_end_bound(text).ok_or_else(|| LogError::InvalidDate {
                value: text.to_string(),
            })?),
            None => None,
        };
        Ok(Self { start, end })
    }

    /// Check if the range places no constraint
    pub fn is_unbounded(&self) -> bool {
        self.start.is_none() && self.end.is_none()
    }

    /// Check whether a textual timestamp lies inside the range
    ///
    /// Fails closed: once any bound is set, an unparseable timestamp is
    /// never in range.
    pub fn contains(&self, timestamp: &str) -> bool {
        if self.is_unbounded() {
            return true;
        }
        match parse_timestamp(timestamp) {
            Some(instant) => self.contains_instant(instant),
            None => false,
        }
    }

    pub fn contains_instant(&self, instant: DateTime<Utc>) -> bool {
        if self.start.is_some_and(|start| instant < start) {
            return false;
        }
        if self.end.is_some_and(|end| instant > end) {
            return false;
        }
        true
    }
}

/// Check whether `timestamp` lies within the optional `[start, end]` range
///
/// An unparseable bound makes the test fail, like an unparseable timestamp.
pub fn in_range(timestamp: &str, start: Option<&str>, end: Option<&str>) -> bool {
    match DateRange::parse(start, end) {
        Ok(range) => range.contains(timestamp),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_timestamp_shapes() {
        assert!(parse_timestamp("2026-02-03T08:52:02.095Z").is_some());
        assert!(parse_timestamp("2026-02-03T08:52:02Z").is_some());
        assert!(parse_timestamp("2026-02-03T08:52:02").is_some());
        assert!(parse_timestamp("2026-02-03T08:52:02.5").is_some());
        assert!(parse_timestamp("2026-02-03").is_some());
        assert!(parse_timestamp("invalid").is_none());
        assert!(parse_timestamp("").is_none());
    }

    #[test]
    fn test_parse_timestamp_ordering() {
        let a = parse_timestamp("2026-02-03T08:52:02.095Z").unwrap();
        let b = parse_timestamp("2026-02-03T08:52:02.100Z").unwrap();
        assert!(a < b);
        let midnight = parse_timestamp("2026-02-03").unwrap();
        assert!(midnight < a);
    }

    #[test]
    fn test_in_range_without_bounds() {
        assert!(in_range("2026-02-03T12:30:00.000Z", None, None));
        assert!(in_range("garbage", None, None));
    }

    #[test]
    fn test_in_range_bare_dates() {
        let ts = "2026-02-03T12:30:00.000Z";
        assert!(in_range(ts, Some("2026-02-03"), None));
        assert!(in_range(ts, None, Some("2026-02-03")));
        assert!(in_range(ts, Some("2026-02-01"), Some("2026-02-05")));
        assert!(!in_range(ts, Some("2026-02-04"), None));
        assert!(!in_range(ts, None, Some("2026-02-02")));
    }

    #[test]
    fn test_end_date_includes_last_millisecond() {
        assert!(in_range("2026-02-03T23:59:59.999Z", None, Some("2026-02-03")));
        assert!(!in_range("2026-02-04T00:00:00.000Z", None, Some("2026-02-03")));
    }

    #[test]
    fn test_in_range_precise_bounds() {
        let ts = "2026-02-03T12:30:00.000Z";
        assert!(in_range(ts, Some("2026-02-03T12:00:00"), Some("2026-02-03T13:00:00")));
        assert!(!in_range(ts, Some("2026-02-03T13:00:00"), None));
    }

    #[test]
    fn test_in_range_fails_closed() {
        assert!(!in_range("not a time", Some("2026-02-03"), None));
        assert!(!in_range("", None, Some("2026-02-03")));
        assert!(!in_range("2026-02-03T12:30:00.000Z", Some("yesterday"), None));
    }

    #[test]
    fn test_date_range_rejects_bad_bound() {
        let err = DateRange::parse(Some("2026-13-45"), None).unwrap_err();
        assert!(matches!(err, LogError::InvalidDate { .. }));
    }
}
