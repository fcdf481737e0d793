//! Data models for outage records and the feature service wire format.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Response envelope of an ArcGIS `FeatureServer` query.
///
/// ArcGIS answers errors with HTTP 200 and an `error` object instead of
/// `features`, so both are optional.
#[derive(Debug, Deserialize, Default)]
pub struct FeatureSet {
    #[serde(default)]
    pub features: Vec<Feature>,
    pub error: Option<Value>,
}

/// A single feature: attribute bag plus an optional point geometry.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Feature {
    #[serde(default)]
    pub attributes: FeatureAttributes,
    pub geometry: Option<Geometry>,
}

/// Point geometry in the layer's spatial reference (Web Mercator here).
#[derive(Debug, Deserialize, Clone, Copy, Default)]
pub struct Geometry {
    pub x: Option<f64>,
    pub y: Option<f64>,
}

/// Outage attributes as published by the Enel power-cut layer.
///
/// Field names are the upstream wire contract and must stay verbatim. Values
/// are kept as raw JSON because the layer mixes numbers and strings for the
/// same field across records.
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct FeatureAttributes {
    pub objectid1: Option<Value>,
    pub objectid: Option<Value>,
    pub latitudine: Option<Value>,
    pub longitudine: Option<Value>,
    pub provincia: Option<Value>,
    pub regione: Option<Value>,
    pub descrizione_territoriale: Option<Value>,
    pub num_cli_disalim: Option<Value>,
    pub causa_disalimentazione: Option<Value>,
    pub data_interruzione: Option<Value>,
    pub dataultimoaggiornamento: Option<Value>,
    pub data_prev_ripristino: Option<Value>,
}

/// Lifecycle status of an outage.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum OutageStatus {
    Active,
    Planned,
    Resolved,
}

impl std::str::FromStr for OutageStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "active" => Ok(Self::Active),
            "planned" => Ok(Self::Planned),
            "resolved" => Ok(Self::Resolved),
            other => Err(format!("unknown outage status '{other}'")),
        }
    }
}

/// A single reported electrical-service interruption.
///
/// Coordinates are decimal-degree strings, matching what the dashboard
/// front-end has always consumed.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Outage {
    pub id: String,
    pub status: OutageStatus,
    pub zone: String,
    pub municipality: String,
    pub province: String,
    pub latitude: String,
    pub longitude: String,
    pub affected_users: u64,
    pub cause: String,
    pub start_time: DateTime<Utc>,
    pub last_update: DateTime<Utc>,
    pub estimated_resolution: Option<DateTime<Utc>>,
    pub actual_resolution: Option<DateTime<Utc>>,
    pub is_planned: bool,
}

/// Coarse grouping of the free-text cause, used by filters and charts.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum CauseCategory {
    Fault,
    Maintenance,
    Weather,
    Works,
    Overload,
    Other,
}

impl CauseCategory {
    /// Classifies a cause by the first matching Italian keyword.
    pub fn classify(cause: &str) -> Self {
        let cause = cause.to_lowercase();
        if cause.contains("guasto") {
            Self::Fault
        } else if cause.contains("manutenzione") || cause.contains("programmata") {
            Self::Maintenance
        } else if cause.contains("meteo") || cause.contains("maltempo") {
            Self::Weather
        } else if cause.contains("lavori") {
            Self::Works
        } else if cause.contains("sovraccarico") {
            Self::Overload
        } else {
            Self::Other
        }
    }

    /// Whether the cause text carries this category's keywords. Unlike
    /// [`classify`](Self::classify) a cause can mention several categories.
    pub fn mentioned_in(self, cause: &str) -> bool {
        let cause = cause.to_lowercase();
        match self {
            Self::Fault => cause.contains("guasto"),
            Self::Maintenance => cause.contains("manutenzione") || cause.contains("programmata"),
            Self::Weather => cause.contains("meteo") || cause.contains("maltempo"),
            Self::Works => cause.contains("lavori"),
            Self::Overload => cause.contains("sovraccarico"),
            Self::Other => Self::classify(&cause) == Self::Other,
        }
    }

    /// Dashboard label.
    pub fn label(self) -> &'static str {
        match self {
            Self::Fault => "Guasti Tecnici",
            Self::Maintenance => "Manutenzione",
            Self::Weather => "Condizioni Meteo",
            Self::Works => "Lavori",
            Self::Overload => "Sovraccarico Rete",
            Self::Other => "Altri",
        }
    }
}

impl std::str::FromStr for CauseCategory {
    type Err = String;

    /// Accepts both the API names (`fault`) and the Italian keywords the
    /// dashboard filters historically used (`guasto`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "fault" | "guasto" => Ok(Self::Fault),
            "maintenance" | "manutenzione" => Ok(Self::Maintenance),
            "weather" | "meteo" => Ok(Self::Weather),
            "works" | "lavori" => Ok(Self::Works),
            "overload" | "sovraccarico" => Ok(Self::Overload),
            "other" | "altri" => Ok(Self::Other),
            other => Err(format!("unknown cause category '{other}'")),
        }
    }
}

/// Outage count and affected users for one province.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProvinceStat {
    pub province: String,
    pub outages: usize,
    pub affected_users: u64,
}

/// Outage count for one cause category.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CauseStat {
    pub category: CauseCategory,
    pub label: String,
    pub outages: usize,
}

/// Outages that started on one (Italian local) calendar day.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TimelineDay {
    pub date: NaiveDate,
    pub outages: usize,
    pub affected_users: u64,
}

/// Statistics computed from outage data.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OutageStats {
    pub total_outages: usize,
    pub total_active: usize,
    pub total_planned: usize,
    pub total_resolved: usize,
    pub total_affected: u64,
    /// Mean outage duration in hours; ongoing outages count up to now.
    pub avg_duration_hours: f64,
    /// Top provinces by outage count.
    pub provinces: Vec<ProvinceStat>,
    pub causes: Vec<CauseStat>,
    /// The last seven days, oldest first, ending today.
    pub timeline: Vec<TimelineDay>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outage_serializes_camel_case() {
        let outage = Outage {
            id: "x".into(),
            status: OutageStatus::Planned,
            zone: "z".into(),
            municipality: "m".into(),
            province: "p".into(),
            latitude: "1".into(),
            longitude: "2".into(),
            affected_users: 3,
            cause: "c".into(),
            start_time: DateTime::from_timestamp(0, 0).unwrap(),
            last_update: DateTime::from_timestamp(0, 0).unwrap(),
            estimated_resolution: None,
            actual_resolution: None,
            is_planned: true,
        };
        let json = serde_json::to_value(&outage).unwrap();
        assert_eq!(json["status"], "planned");
        assert_eq!(json["affectedUsers"], 3);
        assert_eq!(json["isPlanned"], true);
        assert!(json["estimatedResolution"].is_null());
        assert_eq!(json["startTime"], "1970-01-01T00:00:00Z");
    }

    #[test]
    fn test_feature_set_tolerates_missing_fields() {
        let set: FeatureSet = serde_json::from_str(
            r#"{"features":[{"attributes":{"num_cli_disalim":"12","unknown":1}},{}]}"#,
        )
        .unwrap();
        assert_eq!(set.features.len(), 2);
        assert_eq!(
            set.features[0].attributes.num_cli_disalim,
            Some(Value::String("12".into()))
        );
        assert!(set.features[1].geometry.is_none());
    }

    #[test]
    fn test_cause_category_keywords() {
        assert_eq!(
            CauseCategory::classify("Guasto tecnico su trasformatore"),
            CauseCategory::Fault
        );
        assert_eq!(
            CauseCategory::classify("Manutenzione programmata rete"),
            CauseCategory::Maintenance
        );
        assert_eq!(CauseCategory::classify("Maltempo"), CauseCategory::Weather);
        assert_eq!(CauseCategory::classify("Lavori stradali"), CauseCategory::Works);
        assert_eq!(
            CauseCategory::classify("Sovraccarico della rete"),
            CauseCategory::Overload
        );
        assert_eq!(CauseCategory::classify("Sconosciuta"), CauseCategory::Other);
        assert_eq!("guasto".parse::<CauseCategory>(), Ok(CauseCategory::Fault));
    }

    #[test]
    fn test_cause_mentions_overlap() {
        let cause = "Guasto per sovraccarico";
        assert_eq!(CauseCategory::classify(cause), CauseCategory::Fault);
        assert!(CauseCategory::Fault.mentioned_in(cause));
        assert!(CauseCategory::Overload.mentioned_in(cause));
        assert!(!CauseCategory::Other.mentioned_in(cause));
        assert!(CauseCategory::Other.mentioned_in("Sconosciuta"));
        assert_eq!(
            "sovraccarico".parse::<CauseCategory>(),
            Ok(CauseCategory::Overload)
        );
    }

    #[test]
    fn test_status_parse() {
        assert_eq!("Active".parse::<OutageStatus>(), Ok(OutageStatus::Active));
        assert!("bogus".parse::<OutageStatus>().is_err());
    }
}
