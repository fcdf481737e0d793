//! Timestamp parsing for feature service attributes.
//!
//! The layer mixes epoch milliseconds, ISO-8601 strings and Italian local
//! `DD/MM/YYYY HH:MM` strings. Local times are converted to UTC with a fixed
//! CET/CEST offset; the daylight window is approximated as running from
//! midnight of the last Sunday of March to midnight of the last Sunday of
//! October.

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, Utc, Weekday};
use serde_json::Value;

/// Parses a raw attribute value into a UTC timestamp.
///
/// Returns `None` for nulls, empty strings and anything unparseable.
pub fn parse_enel_date(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Number(n) => {
            let millis = n.as_i64().or_else(|| n.as_f64().map(|f| f.round() as i64))?;
            DateTime::from_timestamp_millis(millis)
        }
        Value::String(s) => parse_date_str(s),
        _ => None,
    }
}

fn parse_date_str(raw: &str) -> Option<DateTime<Utc>> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }

    if s.contains('T') || s.contains('Z') {
        return parse_iso(s);
    }

    if s.contains('/') && s.contains(' ') {
        return parse_italian_local(s);
    }

    parse_generic(s)
}

fn parse_iso(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    let trimmed = s.trim_end_matches('Z');
    NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M"))
        .ok()
        .map(|naive| naive.and_utc())
}

/// Parses `DD/MM/YYYY HH:MM` (seconds tolerated) as Italian local time.
fn parse_italian_local(s: &str) -> Option<DateTime<Utc>> {
    let (date_part, time_part) = s.split_once(' ')?;

    let mut date = date_part.split('/');
    let day: u32 = date.next()?.trim().parse().ok()?;
    let month: u32 = date.next()?.trim().parse().ok()?;
    let year: i32 = date.next()?.trim().parse().ok()?;

    let mut time = time_part.trim().split(':');
    let hour: u32 = time.next()?.trim().parse().ok()?;
    let minute: u32 = time.next()?.trim().parse().ok()?;
    let second: u32 = time.next().and_then(|s| s.trim().parse().ok()).unwrap_or(0);

    let local = NaiveDate::from_ymd_opt(year, month, day)?.and_hms_opt(hour, minute, second)?;
    let offset_hours = if is_italian_dst(local) { 2 } else { 1 };
    Some((local - Duration::hours(offset_hours)).and_utc())
}

fn parse_generic(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Some(naive.and_utc());
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M") {
        return Some(naive.and_utc());
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Italian wall-clock time of a UTC instant, using the same approximated
/// daylight window as parsing.
pub fn to_italian_local(utc: DateTime<Utc>) -> NaiveDateTime {
    let winter = utc.naive_utc() + Duration::hours(1);
    if is_italian_dst(winter) {
        winter + Duration::hours(1)
    } else {
        winter
    }
}

/// Whether a local Italian wall-clock time falls in the (approximated)
/// daylight-saving window.
pub fn is_italian_dst(local: NaiveDateTime) -> bool {
    let year = local.year();
    let (Some(start), Some(end)) = (last_sunday(year, 3), last_sunday(year, 10)) else {
        return false;
    };
    let (Some(start), Some(end)) = (start.and_hms_opt(0, 0, 0), end.and_hms_opt(0, 0, 0)) else {
        return false;
    };
    local >= start && local < end
}

/// Last Sunday of a 31-day month.
fn last_sunday(year: i32, month: u32) -> Option<NaiveDate> {
    let last = NaiveDate::from_ymd_opt(year, month, 31)?;
    let back = last.weekday().num_days_from_sunday();
    last.checked_sub_signed(Duration::days(i64::from(back)))
        .filter(|d| d.weekday() == Weekday::Sun)
}
