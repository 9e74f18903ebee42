// Copyright Catenary Transit Initiatives
// Cross-references migration clusters with shipping lanes

use crate::clustering::{
    DEFAULT_EPS_KM, DEFAULT_MIN_SAMPLES, cluster_observations, group_clusters, is_clustered,
};
use crate::errors::{ConflictResult, require_positive};
use crate::geometry::point_to_polyline_distance_km;
use crate::models::{ConflictZone, Lane, Observation};
use log::{debug, info};
use std::borrow::Cow;

/// 100 at zero distance, 0 at the threshold, linear in between, clamped to [0, 100].
pub fn risk_level(distance_km: f64, distance_threshold_km: f64) -> f64 {
    (100.0 * (1.0 - distance_km / distance_threshold_km)).clamp(0.0, 100.0)
}

/// Scores every (cluster, lane) pair whose centroid-to-lane distance is
/// within `distance_threshold_km`.
///
/// Observations without cluster assignments are clustered first with
/// `eps_km = 50`, `min_samples = 5`. The result is sorted by risk, highest
/// first; equal risks keep cluster order, then lane order.
pub fn detect_conflicts(
    observations: &[Observation],
    lanes: &[Lane],
    distance_threshold_km: f64,
) -> ConflictResult<Vec<ConflictZone>> {
    require_positive("distance_threshold_km", distance_threshold_km)?;

    let observations: Cow<[Observation]> = if is_clustered(observations) {
        Cow::Borrowed(observations)
    } else {
        info!(
            "No cluster assignments present, clustering with eps_km={} min_samples={}",
            DEFAULT_EPS_KM, DEFAULT_MIN_SAMPLES
        );
        Cow::Owned(cluster_observations(
            observations,
            DEFAULT_EPS_KM,
            DEFAULT_MIN_SAMPLES,
        )?)
    };

    let lane_waypoints: Vec<_> = lanes.iter().map(Lane::waypoints).collect();
    let mut conflicts = Vec::new();

    for cluster in group_clusters(&observations) {
        for (lane_id, (lane, waypoints)) in lanes.iter().zip(&lane_waypoints).enumerate() {
            let Some(distance_km) = point_to_polyline_distance_km(cluster.centroid, waypoints)
            else {
                debug!("Skipping lane {} with no coordinates", lane_id);
                continue;
            };

            if distance_km <= distance_threshold_km {
                conflicts.push(ConflictZone {
                    cluster_id: cluster.cluster_id,
                    cluster_center: cluster.centroid,
                    time_range: cluster.time_range.clone(),
                    shipping_lane_id: lane_id,
                    shipping_lane_name: lane.display_name(lane_id),
                    distance_km,
                    risk_level: risk_level(distance_km, distance_threshold_km),
                    species: cluster.species.clone(),
                    count: cluster.size(),
                });
            }
        }
    }

    // stable: ties keep discovery order
    conflicts.sort_by(|a, b| b.risk_level.total_cmp(&a.risk_level));

    info!(
        "Detected {} conflicts within {} km",
        conflicts.len(),
        distance_threshold_km
    );

    Ok(conflicts)
}

/// Conflicts recorded against one lane, in their stored order.
pub fn conflicts_for_lane(conflicts: &[ConflictZone], lane_id: usize) -> Vec<ConflictZone> {
    conflicts
        .iter()
        .filter(|c| c.shipping_lane_id == lane_id)
        .cloned()
        .collect()
}
