// Copyright Catenary Transit Initiatives
// Summary and monthly rollups over detected conflicts

use crate::clustering::cluster_months;
use crate::models::{
    ConflictSummary, ConflictZone, MonthKey, MonthlyConflictStats, Observation, UNKNOWN_SPECIES,
};
use ahash::AHashSet;
use serde::Serialize;
use std::collections::BTreeMap;

pub const HIGH_RISK_FLOOR: f64 = 70.0;
pub const MEDIUM_RISK_FLOOR: f64 = 30.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskBand {
    High,
    Medium,
    Low,
}

impl RiskBand {
    pub fn from_risk_level(risk_level: f64) -> Self {
        if risk_level >= HIGH_RISK_FLOOR {
            RiskBand::High
        } else if risk_level >= MEDIUM_RISK_FLOOR {
            RiskBand::Medium
        } else {
            RiskBand::Low
        }
    }
}

fn mean_risk<'a>(conflicts: impl IntoIterator<Item = &'a ConflictZone>) -> f64 {
    let (count, total) = conflicts
        .into_iter()
        .fold((0usize, 0.0), |acc, c| (acc.0 + 1, acc.1 + c.risk_level));
    if count == 0 { 0.0 } else { total / count as f64 }
}

pub fn summarize(conflicts: &[ConflictZone]) -> ConflictSummary {
    let mut summary = ConflictSummary {
        total_conflicts: conflicts.len(),
        avg_risk_level: mean_risk(conflicts),
        ..Default::default()
    };

    for conflict in conflicts {
        match RiskBand::from_risk_level(conflict.risk_level) {
            RiskBand::High => summary.high_risk_count += 1,
            RiskBand::Medium => summary.medium_risk_count += 1,
            RiskBand::Low => summary.low_risk_count += 1,
        }
    }

    summary.species_affected = conflicts
        .iter()
        .map(|c| c.species.as_str())
        .filter(|s| *s != UNKNOWN_SPECIES)
        .collect::<AHashSet<&str>>()
        .len();

    summary
}

/// Buckets conflicts by the months their source cluster was observed in.
///
/// A conflict lands in every distinct month of its cluster, so one conflict
/// can be counted in several buckets. Buckets iterate chronologically and
/// serialize with `"month/year"` keys. Observations without month and year
/// contribute nothing.
pub fn monthly_stats(
    observations: &[Observation],
    conflicts: &[ConflictZone],
) -> BTreeMap<MonthKey, MonthlyConflictStats> {
    let mut buckets: BTreeMap<MonthKey, MonthlyConflictStats> = BTreeMap::new();

    for conflict in conflicts {
        for month in cluster_months(observations, conflict.cluster_id) {
            let bucket = buckets.entry(month).or_default();
            bucket.conflict_count += 1;
            bucket.conflicts.push(conflict.clone());
        }
    }

    for bucket in buckets.values_mut() {
        bucket.avg_risk_level = mean_risk(&bucket.conflicts);
    }

    buckets
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{LatLon, TimeRange};

    fn conflict(cluster_id: i32, risk_level: f64, species: &str) -> ConflictZone {
        ConflictZone {
            cluster_id,
            cluster_center: LatLon::new(0.0, 0.0),
            time_range: TimeRange::unknown(),
            shipping_lane_id: 0,
            shipping_lane_name: "Lane 0".to_string(),
            distance_km: 1.0,
            risk_level,
            species: species.to_string(),
            count: 5,
        }
    }

    fn observed(cluster_id: i32, month: u32, year: i32) -> Observation {
        Observation {
            cluster_id: Some(cluster_id),
            ..Observation::new(0.0, 0.0).with_month(month, year)
        }
    }

    #[test]
    fn empty_summary_is_all_zero() {
        assert_eq!(summarize(&[]), ConflictSummary::default());
    }

    #[test]
    fn bands_split_at_70_and_30() {
        let conflicts = vec![
            conflict(0, 70.0, "Salmon"),
            conflict(1, 69.9, "Salmon"),
            conflict(2, 30.0, "Eel"),
            conflict(3, 29.9, UNKNOWN_SPECIES),
        ];
        let summary = summarize(&conflicts);

        assert_eq!(summary.total_conflicts, 4);
        assert_eq!(summary.high_risk_count, 1);
        assert_eq!(summary.medium_risk_count, 2);
        assert_eq!(summary.low_risk_count, 1);
        assert_eq!(
            summary.high_risk_count + summary.medium_risk_count + summary.low_risk_count,
            summary.total_conflicts
        );
        assert_eq!(summary.species_affected, 2);
        assert!((summary.avg_risk_level - 49.95).abs() < 1e-9);
    }

    #[test]
    fn conflicts_repeat_across_cluster_months() {
        let observations = vec![
            observed(0, 3, 2023),
            observed(0, 4, 2023),
            observed(0, 3, 2023),
            observed(1, 4, 2023),
        ];
        let conflicts = vec![conflict(0, 80.0, "Salmon"), conflict(1, 40.0, "Eel")];

        let stats = monthly_stats(&observations, &conflicts);
        let march = &stats[&MonthKey {
            year: 2023,
            month: 3,
        }];
        let april = &stats[&MonthKey {
            year: 2023,
            month: 4,
        }];

        assert_eq!(march.conflict_count, 1);
        assert_eq!(march.avg_risk_level, 80.0);
        assert_eq!(april.conflict_count, 2);
        assert_eq!(april.avg_risk_level, 60.0);
        assert_eq!(april.conflicts.len(), 2);
    }

    #[test]
    fn monthly_keys_serialize_as_month_slash_year() {
        let observations = vec![observed(0, 12, 2022), observed(0, 1, 2023)];
        let stats = monthly_stats(&observations, &[conflict(0, 50.0, "Salmon")]);

        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["12/2022"]["conflict_count"], 1);
        assert_eq!(json["1/2023"]["avg_risk_level"], 50.0);

        let keys: Vec<String> = stats.keys().map(|k| k.to_string()).collect();
        assert_eq!(keys, vec!["12/2022", "1/2023"]);
    }

    #[test]
    fn no_month_fields_means_no_buckets() {
        let observations = vec![Observation {
            cluster_id: Some(0),
            ..Observation::new(0.0, 0.0)
        }];
        assert!(monthly_stats(&observations, &[conflict(0, 50.0, "Salmon")]).is_empty());
    }
}
