use anyhow::anyhow;
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;

/// Placeholder shown where an event time could not be parsed.
pub const TIME_PLACEHOLDER: &str = "—";

/// Datetime-local shapes produced by `<input type="datetime-local">` and
/// date pickers, tried after full RFC 3339.
const NAIVE_CANDIDATES: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.3f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.3f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
];

/// Which end of an inclusive timestamp range a bound belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeBound {
    Start,
    End,
}

/// Parse a backend or UI timestamp into UTC.
///
/// Accepts full RFC 3339, datetime-local shapes (treated as UTC, matching
/// how event times are stored), and bare dates (midnight).
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }

    for pat in NAIVE_CANDIDATES {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, pat) {
            return Some(naive.and_utc());
        }
    }

    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0).map(|n| n.and_utc());
    }

    None
}

/// Resolve a filter bound to epoch milliseconds.
///
/// A bare date used as the end of a range resolves to the last instant of
/// that day so the range stays inclusive of the named day.
pub fn bound_epoch_ms(s: &str, bound: RangeBound) -> anyhow::Result<i64> {
    let s = s.trim();

    if bound == RangeBound::End {
        if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
            let naive = date
                .and_hms_milli_opt(23, 59, 59, 999)
                .ok_or_else(|| anyhow!("invalid date"))?;
            return Ok(naive.and_utc().timestamp_millis());
        }
    }

    parse_timestamp(s)
        .map(|dt| dt.timestamp_millis())
        .ok_or_else(|| anyhow!("invalid datetime format"))
}

pub fn epoch_ms(dt: &DateTime<Utc>) -> i64 {
    dt.timestamp_millis()
}

/// Hour-of-day (0..=23) of a UTC instant viewed in the given timezone.
pub fn hour_in_tz(dt: &DateTime<Utc>, tz: &Tz) -> u32 {
    use chrono::Timelike;
    tz.from_utc_datetime(&dt.naive_utc()).hour()
}

/// Display form used by the log list and alert feed.
pub fn format_display(ts: Option<&DateTime<Utc>>) -> String {
    match ts {
        Some(dt) => dt.format("%d %b %Y %H:%M:%S").to_string(),
        None => TIME_PLACEHOLDER.to_string(),
    }
}
