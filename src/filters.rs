//! Query filters over the cached outage list.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};
use std::str::FromStr;

use crate::geo::region_for_province;
use crate::models::{CauseCategory, Outage, OutageStatus};

/// Filter parameters accepted by the outage list endpoints.
///
/// All conditions are combined with AND; empty query values are ignored.
/// Values that name no known status, cause, duration or period match no
/// outage instead of failing the request.
#[derive(Debug, Default, Deserialize)]
pub struct OutageFilter {
    /// `active`, `planned` or `resolved`.
    #[serde(default, deserialize_with = "empty_string_as_none_str")]
    pub status: Option<String>,
    /// Case-insensitive substring of the zone.
    #[serde(default, deserialize_with = "empty_string_as_none_str")]
    pub zone: Option<String>,
    /// Region name, derived from the province.
    #[serde(default, deserialize_with = "empty_string_as_none_str")]
    pub region: Option<String>,
    /// Free text over municipality, province, zone and region.
    #[serde(default, deserialize_with = "empty_string_as_none_str")]
    pub q: Option<String>,
    /// Cause category, by English or Italian name.
    #[serde(default, deserialize_with = "empty_string_as_none_str")]
    pub cause: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub min_users: Option<u64>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub max_users: Option<u64>,
    /// `short`, `medium`, `long` or `ongoing`.
    #[serde(default, deserialize_with = "empty_string_as_none_str")]
    pub duration: Option<String>,
    /// `today`, `week`, `month` or `active`.
    #[serde(default, deserialize_with = "empty_string_as_none_str")]
    pub date_range: Option<String>,
}

/// Outage length buckets. Ongoing outages are measured up to now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DurationBucket {
    /// Under 2 hours.
    Short,
    /// 2 to 6 hours, both ends included.
    Medium,
    /// Over 6 hours.
    Long,
    /// Still active, whatever the length.
    Ongoing,
}

impl FromStr for DurationBucket {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "short" => Ok(Self::Short),
            "medium" => Ok(Self::Medium),
            "long" => Ok(Self::Long),
            "ongoing" => Ok(Self::Ongoing),
            other => Err(format!("unknown duration '{other}'")),
        }
    }
}

impl DurationBucket {
    fn contains(self, outage: &Outage, now: DateTime<Utc>) -> bool {
        let end = outage.actual_resolution.unwrap_or(now);
        let hours = (end - outage.start_time).num_seconds() as f64 / 3600.0;
        match self {
            Self::Short => hours < 2.0,
            Self::Medium => (2.0..=6.0).contains(&hours),
            Self::Long => hours > 6.0,
            Self::Ongoing => outage.status == OutageStatus::Active,
        }
    }
}

/// How recently an outage started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateRange {
    Today,
    Week,
    Month,
    /// Still active, whenever it started.
    Active,
}

impl FromStr for DateRange {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "today" => Ok(Self::Today),
            "week" => Ok(Self::Week),
            "month" => Ok(Self::Month),
            "active" => Ok(Self::Active),
            other => Err(format!("unknown date range '{other}'")),
        }
    }
}

impl DateRange {
    fn contains(self, outage: &Outage, now: DateTime<Utc>) -> bool {
        let days = (now - outage.start_time).num_seconds() as f64 / 86_400.0;
        match self {
            Self::Today => days <= 1.0,
            Self::Week => days <= 7.0,
            Self::Month => days <= 30.0,
            Self::Active => outage.status == OutageStatus::Active,
        }
    }
}

fn empty_string_as_none<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let opt: Option<String> = Option::deserialize(deserializer)?;
    match opt {
        None => Ok(None),
        Some(s) if s.trim().is_empty() => Ok(None),
        Some(s) => s.trim().parse::<T>().map(Some).map_err(serde::de::Error::custom),
    }
}

fn empty_string_as_none_str<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt: Option<String> = Option::deserialize(deserializer)?;
    match opt {
        None => Ok(None),
        Some(s) if s.trim().is_empty() || s == "all" => Ok(None),
        Some(s) => Ok(Some(s.trim().to_string())),
    }
}

/// Region label of an outage: the province lookup, else its zone.
pub fn region_of(outage: &Outage) -> &str {
    region_for_province(&outage.province).unwrap_or(outage.zone.as_str())
}

/// Whether `raw` parses to a `T` accepted by `pred`. Unknown values match
/// nothing.
fn parsed_matches<T: FromStr>(raw: &str, pred: impl FnOnce(T) -> bool) -> bool {
    raw.parse::<T>().is_ok_and(pred)
}

impl OutageFilter {
    /// Whether `outage` passes every set condition. `now` closes the
    /// duration and age of ongoing outages.
    pub fn matches(&self, outage: &Outage, now: DateTime<Utc>) -> bool {
        if let Some(status) = &self.status {
            if !parsed_matches(status, |s: OutageStatus| s == outage.status) {
                return false;
            }
        }

        if let Some(zone) = &self.zone {
            if !outage.zone.to_lowercase().contains(&zone.to_lowercase()) {
                return false;
            }
        }

        if let Some(region) = &self.region {
            if !region_of(outage).eq_ignore_ascii_case(region) {
                return false;
            }
        }

        if let Some(q) = &self.q {
            let haystack = [
                outage.municipality.as_str(),
                outage.province.as_str(),
                outage.zone.as_str(),
                region_of(outage),
            ]
            .join(" ")
            .to_lowercase();
            if !haystack.contains(&q.to_lowercase()) {
                return false;
            }
        }

        if let Some(cause) = &self.cause {
            if !parsed_matches(cause, |c: CauseCategory| c.mentioned_in(&outage.cause)) {
                return false;
            }
        }

        if self.min_users.is_some_and(|min| outage.affected_users < min) {
            return false;
        }

        if self.max_users.is_some_and(|max| outage.affected_users > max) {
            return false;
        }

        if let Some(duration) = &self.duration {
            if !parsed_matches(duration, |d: DurationBucket| d.contains(outage, now)) {
                return false;
            }
        }

        match &self.date_range {
            Some(range) => parsed_matches(range, |r: DateRange| r.contains(outage, now)),
            None => true,
        }
    }

    /// Outages matching the filter, in their original order.
    pub fn apply<'a>(&self, outages: &'a [Outage], now: DateTime<Utc>) -> Vec<&'a Outage> {
        outages.iter().filter(|o| self.matches(o, now)).collect()
    }
}
