//! Outage data: normalization of raw feature service records and the demo
//! dataset served when nothing better is available.

use chrono::{DateTime, Duration, Utc};
use serde_json::Value;

use crate::dates::parse_enel_date;
use crate::geo::{self, LatLng};
use crate::models::{Feature, Outage, OutageStatus};

const UNKNOWN_MUNICIPALITY: &str = "Comune non specificato";
const UNKNOWN_PROVINCE: &str = "Provincia non specificata";
const UNKNOWN_ZONE: &str = "Regione non specificata";
const DEFAULT_CAUSE: &str = "Guasto elettrico - Enel";
const PLANNED_KEYWORD: &str = "programmato";

/// Converts one raw feature into an [`Outage`].
///
/// `index` is the feature's position in the merged result and is only used
/// for the id when the feature carries no object id. Missing or malformed
/// fields fall back to defaults; a feature is never rejected.
pub fn normalize_feature(feature: &Feature, index: usize, now: DateTime<Utc>) -> Outage {
    let attrs = &feature.attributes;

    let point = explicit_lat_lng(attrs.latitudine.as_ref(), attrs.longitudine.as_ref())
        .or_else(|| {
            let geometry = feature.geometry?;
            Some(geo::mercator_to_lat_lng(geometry.x?, geometry.y?))
        })
        .unwrap_or(geo::ITALY_CENTER);

    let mut zone = text(attrs.regione.as_ref()).unwrap_or_else(|| UNKNOWN_ZONE.to_string());
    let mut province =
        text(attrs.provincia.as_ref()).unwrap_or_else(|| UNKNOWN_PROVINCE.to_string());
    let mut municipality = text(attrs.descrizione_territoriale.as_ref())
        .map(|desc| municipality_from_description(&desc))
        .unwrap_or_default();

    if municipality.is_empty() || municipality == UNKNOWN_MUNICIPALITY {
        let area = geo::classify_area(point);
        zone = area.zone.to_string();
        municipality = area.municipality.to_string();
        province = area.province.to_string();
    }

    let cause = text(attrs.causa_disalimentazione.as_ref())
        .unwrap_or_else(|| DEFAULT_CAUSE.to_string());
    let is_planned = is_planned_cause(&cause);

    let id = [attrs.objectid1.as_ref(), attrs.objectid.as_ref()]
        .into_iter()
        .flatten()
        .find_map(|v| text(Some(v)))
        .unwrap_or_else(|| index.to_string());

    Outage {
        id: format!("enel-real-{id}"),
        status: if is_planned {
            OutageStatus::Planned
        } else {
            OutageStatus::Active
        },
        zone,
        municipality,
        province,
        latitude: point.lat.to_string(),
        longitude: point.lng.to_string(),
        affected_users: affected_users(attrs.num_cli_disalim.as_ref()),
        cause,
        start_time: date(attrs.data_interruzione.as_ref()).unwrap_or(now),
        last_update: date(attrs.dataultimoaggiornamento.as_ref()).unwrap_or(now),
        estimated_resolution: date(attrs.data_prev_ripristino.as_ref()),
        actual_resolution: None,
        is_planned,
    }
}

/// Whether the cause text announces planned maintenance.
pub fn is_planned_cause(cause: &str) -> bool {
    cause.to_lowercase().contains(PLANNED_KEYWORD)
}

/// Drops the province prefix of a `descrizione_territoriale` value, e.g.
/// `"CA-MARINA TUVIXEDDU"` becomes `"MARINA TUVIXEDDU"`.
fn municipality_from_description(desc: &str) -> String {
    match desc.split_once('-') {
        Some((_, rest)) => rest.trim().to_string(),
        None => desc.trim().to_string(),
    }
}

fn explicit_lat_lng(lat: Option<&Value>, lng: Option<&Value>) -> Option<LatLng> {
    let lat = number(lat?)?;
    let lng = number(lng?)?;
    if lat == 0.0 || lng == 0.0 {
        return None;
    }
    Some(LatLng { lat, lng })
}

fn number(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    n.filter(|f| f.is_finite())
}

/// Non-empty trimmed text of a string or number attribute.
fn text(value: Option<&Value>) -> Option<String> {
    let s = match value? {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    (!s.is_empty()).then_some(s)
}

fn affected_users(value: Option<&Value>) -> u64 {
    value
        .and_then(number)
        .map(|n| if n > 0.0 { n.round() as u64 } else { 0 })
        .unwrap_or(0)
}

fn date(value: Option<&Value>) -> Option<DateTime<Utc>> {
    value.and_then(parse_enel_date)
}

/// Hand-coded Calabrian outages served when the feature service is
/// unreachable and nothing has been cached yet. Times are relative to `now`.
pub fn demo_outages(now: DateTime<Utc>) -> Vec<Outage> {
    let hours = |h: f64| Duration::minutes((h * 60.0) as i64);
    vec![
        Outage {
            id: "cal-cosenza-001".into(),
            status: OutageStatus::Active,
            zone: "Cosenza Centro".into(),
            municipality: "Cosenza".into(),
            province: "CS".into(),
            latitude: "39.2986".into(),
            longitude: "16.2543".into(),
            affected_users: 1250,
            cause: "Interruzione per guasto su linea di media tensione".into(),
            start_time: now - hours(3.0),
            last_update: now - hours(0.5),
            estimated_resolution: Some(now + hours(1.0)),
            actual_resolution: None,
            is_planned: false,
        },
        Outage {
            id: "cal-reggio-002".into(),
            status: OutageStatus::Active,
            zone: "Reggio Calabria Sud".into(),
            municipality: "Reggio Calabria".into(),
            province: "RC".into(),
            latitude: "38.1067".into(),
            longitude: "15.6536".into(),
            affected_users: 2100,
            cause: "Guasto tecnico su trasformatore di cabina primaria".into(),
            start_time: now - hours(1.5),
            last_update: now - hours(0.75),
            estimated_resolution: Some(now + hours(2.5)),
            actual_resolution: None,
            is_planned: false,
        },
        Outage {
            id: "cal-catanzaro-003".into(),
            status: OutageStatus::Planned,
            zone: "Catanzaro Lido".into(),
            municipality: "Catanzaro".into(),
            province: "CZ".into(),
            latitude: "38.9097".into(),
            longitude: "16.5897".into(),
            affected_users: 850,
            cause: "Manutenzione programmata rete di distribuzione".into(),
            start_time: now + hours(2.0),
            last_update: now - hours(0.25),
            estimated_resolution: Some(now + hours(6.0)),
            actual_resolution: None,
            is_planned: true,
        },
    ]
}
