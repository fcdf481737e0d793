//! Dashboard statistics over a set of outages.

use chrono::{DateTime, Duration, Utc};
use itertools::Itertools;
use polars::prelude::*;

use crate::dates::to_italian_local;
use crate::error::OutageError;
use crate::models::{
    CauseCategory, CauseStat, Outage, OutageStats, OutageStatus, ProvinceStat, TimelineDay,
};

/// Number of provinces listed in the ranking.
const TOP_PROVINCES: u32 = 10;

/// Days covered by the timeline, today included.
const TIMELINE_DAYS: i64 = 7;

/// Computes dashboard statistics. `now` closes the duration of outages that
/// have no actual resolution yet.
///
/// # Errors
///
/// Returns [`OutageError::Analytics`] if the province aggregation fails.
pub fn compute_stats(outages: &[Outage], now: DateTime<Utc>) -> Result<OutageStats, OutageError> {
    let count = |status: OutageStatus| outages.iter().filter(|o| o.status == status).count();

    let avg_duration_hours = if outages.is_empty() {
        0.0
    } else {
        let total_secs: i64 = outages
            .iter()
            .map(|o| (o.actual_resolution.unwrap_or(now) - o.start_time).num_seconds())
            .sum();
        total_secs as f64 / outages.len() as f64 / 3600.0
    };

    Ok(OutageStats {
        total_outages: outages.len(),
        total_active: count(OutageStatus::Active),
        total_planned: outages.iter().filter(|o| o.is_planned).count(),
        total_resolved: count(OutageStatus::Resolved),
        total_affected: outages.iter().map(|o| o.affected_users).sum(),
        avg_duration_hours,
        provinces: province_ranking(outages)?,
        causes: cause_breakdown(outages),
        timeline: timeline(outages, now),
    })
}

/// Per-day counts by start date over the last [`TIMELINE_DAYS`], in Italian
/// local days. Outages starting outside the window are ignored.
fn timeline(outages: &[Outage], now: DateTime<Utc>) -> Vec<TimelineDay> {
    let today = to_italian_local(now).date();
    let started: Vec<_> = outages
        .iter()
        .map(|o| (to_italian_local(o.start_time).date(), o.affected_users))
        .collect();

    (0..TIMELINE_DAYS)
        .rev()
        .map(|back| {
            let date = today - Duration::days(back);
            let day = started.iter().filter(|(d, _)| *d == date);
            TimelineDay {
                date,
                outages: day.clone().count(),
                affected_users: day.map(|(_, users)| users).sum(),
            }
        })
        .collect()
}

/// Top provinces by outage count, ties broken by name.
fn province_ranking(outages: &[Outage]) -> Result<Vec<ProvinceStat>, OutageError> {
    if outages.is_empty() {
        return Ok(Vec::new());
    }

    let provinces: Vec<&str> = outages.iter().map(|o| o.province.as_str()).collect();
    let users: Vec<u64> = outages.iter().map(|o| o.affected_users).collect();
    let df = df!("province" => provinces, "affected_users" => users)?;

    let res = df
        .lazy()
        .group_by([col("province")])
        .agg([
            len().alias("outages"),
            col("affected_users").sum().alias("affected_users"),
        ])
        .sort(
            ["outages", "province"],
            SortMultipleOptions::default().with_order_descending_multi([true, false]),
        )
        .limit(TOP_PROVINCES)
        .collect()?;

    let names: Vec<String> = res
        .column("province")?
        .str()?
        .into_iter()
        .map(|s| s.unwrap_or_default().to_string())
        .collect();
    let counts = u64_column(&res, "outages")?;
    let affected = u64_column(&res, "affected_users")?;

    Ok(names
        .into_iter()
        .zip(counts)
        .zip(affected)
        .map(|((province, outages), affected_users)| ProvinceStat {
            province,
            outages: outages as usize,
            affected_users,
        })
        .collect())
}

fn u64_column(df: &DataFrame, name: &str) -> Result<Vec<u64>, OutageError> {
    let cast = df.column(name)?.cast(&DataType::UInt64)?;
    Ok(cast.u64()?.into_iter().map(|v| v.unwrap_or(0)).collect())
}

/// Outage counts per cause category, largest first.
fn cause_breakdown(outages: &[Outage]) -> Vec<CauseStat> {
    outages
        .iter()
        .map(|o| CauseCategory::classify(&o.cause))
        .counts()
        .into_iter()
        .sorted_by(|(a, x), (b, y)| y.cmp(x).then(a.cmp(b)))
        .map(|(category, outages)| CauseStat {
            category,
            label: category.label().to_string(),
            outages,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::demo_outages;
    use chrono::NaiveDate;

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2024-06-25T15:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn outage(id: &str, province: &str, users: u64, cause: &str) -> Outage {
        let mut o = demo_outages(now()).remove(0);
        o.id = id.into();
        o.province = province.into();
        o.affected_users = users;
        o.cause = cause.into();
        o.start_time = now() - Duration::hours(2);
        o
    }

    #[test]
    fn test_empty_input() {
        let stats = compute_stats(&[], now()).unwrap();
        assert_eq!(stats.total_outages, 0);
        assert_eq!(stats.avg_duration_hours, 0.0);
        assert!(stats.provinces.is_empty());
        assert!(stats.causes.is_empty());
        assert_eq!(stats.timeline.len(), 7);
        assert!(stats.timeline.iter().all(|d| d.outages == 0));
    }

    #[test]
    fn test_timeline_buckets_last_seven_days() {
        let mut list = vec![
            outage("1", "RC", 10, "Guasto"),
            outage("2", "RC", 5, "Guasto"),
            outage("3", "CS", 7, "Guasto"),
            outage("4", "CS", 1, "Guasto"),
        ];
        list[1].start_time = now() - Duration::days(1);
        // 23:30Z on the 21st is already the 22nd in Rome (UTC+2).
        list[2].start_time = DateTime::parse_from_rfc3339("2024-06-21T23:30:00Z")
            .unwrap()
            .with_timezone(&Utc);
        list[3].start_time = now() - Duration::days(10);

        let stats = compute_stats(&list, now()).unwrap();
        let day = |d: u32| NaiveDate::from_ymd_opt(2024, 6, d).unwrap();

        assert_eq!(stats.timeline.len(), 7);
        assert_eq!(stats.timeline[0].date, day(19));
        assert_eq!(
            stats.timeline[6],
            TimelineDay {
                date: day(25),
                outages: 1,
                affected_users: 10
            }
        );
        assert_eq!(stats.timeline[5].outages, 1);
        assert_eq!(stats.timeline[5].affected_users, 5);
        assert_eq!(stats.timeline[3].date, day(22));
        assert_eq!(stats.timeline[3].outages, 1);
        assert_eq!(stats.timeline.iter().map(|d| d.outages).sum::<usize>(), 3);
    }

    #[test]
    fn test_demo_totals() {
        let stats = compute_stats(&demo_outages(now()), now()).unwrap();
        assert_eq!(stats.total_outages, 3);
        assert_eq!(stats.total_active, 2);
        assert_eq!(stats.total_planned, 1);
        assert_eq!(stats.total_resolved, 0);
        assert_eq!(stats.total_affected, 1250 + 2100 + 850);
        // (3h + 1.5h - 2h) / 3
        assert!((stats.avg_duration_hours - 2.5 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_resolved_outage_uses_actual_resolution() {
        let mut o = outage("a", "CS", 1, "Guasto");
        o.status = OutageStatus::Resolved;
        o.actual_resolution = Some(o.start_time + Duration::minutes(30));
        let stats = compute_stats(&[o], now()).unwrap();
        assert_eq!(stats.total_resolved, 1);
        assert!((stats.avg_duration_hours - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_province_ranking() {
        let list = vec![
            outage("1", "RC", 10, "Guasto"),
            outage("2", "CS", 5, "Guasto"),
            outage("3", "RC", 20, "Maltempo"),
            outage("4", "CZ", 1, "Lavori"),
            outage("5", "CS", 7, "Manutenzione programmata"),
            outage("6", "RC", 0, "Altro"),
        ];
        let stats = compute_stats(&list, now()).unwrap();
        assert_eq!(
            stats.provinces,
            vec![
                ProvinceStat {
                    province: "RC".into(),
                    outages: 3,
                    affected_users: 30
                },
                ProvinceStat {
                    province: "CS".into(),
                    outages: 2,
                    affected_users: 12
                },
                ProvinceStat {
                    province: "CZ".into(),
                    outages: 1,
                    affected_users: 1
                },
            ]
        );
    }

    #[test]
    fn test_province_ranking_is_capped() {
        let list: Vec<_> = (0..15)
            .map(|i| outage(&i.to_string(), &format!("P{i:02}"), 1, "Guasto"))
            .collect();
        let stats = compute_stats(&list, now()).unwrap();
        assert_eq!(stats.provinces.len(), 10);
        assert_eq!(stats.provinces[0].province, "P00");
    }

    #[test]
    fn test_cause_breakdown() {
        let list = vec![
            outage("1", "RC", 1, "Guasto su linea"),
            outage("2", "RC", 1, "guasto cabina"),
            outage("3", "RC", 1, "Maltempo"),
            outage("4", "RC", 1, "Lavori"),
        ];
        let stats = compute_stats(&list, now()).unwrap();
        assert_eq!(stats.causes[0].category, CauseCategory::Fault);
        assert_eq!(stats.causes[0].outages, 2);
        assert_eq!(stats.causes[0].label, "Guasti Tecnici");
        assert_eq!(stats.causes.len(), 3);
        assert_eq!(stats.causes[1].category, CauseCategory::Weather);
    }
}
