// Copyright Catenary Transit Initiatives
// Heuristic lane displacement away from conflict centroids

use crate::errors::{ConflictError, ConflictResult, require_positive};
use crate::geometry::{buffer_disk, km_to_degrees, route_intersects};
use crate::models::{ConflictZone, LatLon, Lane, RouteSuggestion};
use log::{debug, info};

pub const DEFAULT_BUFFER_KM: f64 = 20.0;

/// Proposes an alternate path for `lane` that steps away from each conflict.
///
/// For every conflict, in order, the waypoint nearest its centroid (planar
/// distance in degrees) is pushed directly away from the centroid by the
/// buffer radius. Displacements are applied to a working copy one after
/// another, so a waypoint nearest to several conflicts moves several times.
pub fn suggest_route(
    lane_id: usize,
    lane: &Lane,
    conflicts_for_lane: &[ConflictZone],
    buffer_km: f64,
) -> ConflictResult<RouteSuggestion> {
    require_positive("buffer_km", buffer_km)?;
    if lane.coordinates.is_empty() {
        return Err(ConflictError::invalid(format!(
            "No coordinates for lane ID: {}",
            lane_id
        )));
    }

    let unchanged = |message: &str| RouteSuggestion {
        lane_id,
        lane_name: lane.display_name(lane_id),
        original_route: lane.coordinates.clone(),
        suggested_route: lane.coordinates.clone(),
        message: message.to_string(),
        conflicts_avoided: 0,
    };

    if conflicts_for_lane.is_empty() {
        return Ok(unchanged("No conflicts detected for this lane"));
    }

    let radius_deg = km_to_degrees(buffer_km);
    let original = lane.waypoints();

    let touches_buffer = conflicts_for_lane
        .iter()
        .any(|c| route_intersects(&original, &buffer_disk(c.cluster_center, radius_deg)));

    if !touches_buffer {
        return Ok(unchanged("Lane already avoids conflict zones"));
    }

    let mut working = original;
    for conflict in conflicts_for_lane {
        displace_nearest(&mut working, conflict.cluster_center, radius_deg);
    }

    info!(
        "Suggested route for lane {} displaced around {} conflicts",
        lane_id,
        conflicts_for_lane.len()
    );

    Ok(RouteSuggestion {
        lane_id,
        lane_name: lane.display_name(lane_id),
        original_route: lane.coordinates.clone(),
        suggested_route: working
            .iter()
            .map(|p| [p.latitude, p.longitude])
            .collect(),
        message: format!(
            "Modified route to avoid {} conflict zones",
            conflicts_for_lane.len()
        ),
        conflicts_avoided: conflicts_for_lane.len(),
    })
}

fn planar_distance_deg(a: LatLon, b: LatLon) -> f64 {
    (a.latitude - b.latitude).hypot(a.longitude - b.longitude)
}

/// Moves the waypoint nearest `center` outward by `radius_deg`. A waypoint
/// sitting exactly on the center has no outward direction and stays put.
fn displace_nearest(waypoints: &mut [LatLon], center: LatLon, radius_deg: f64) {
    let mut nearest: Option<(usize, f64)> = None;
    for (idx, p) in waypoints.iter().enumerate() {
        let d = planar_distance_deg(*p, center);
        if nearest.is_none_or(|(_, best)| d < best) {
            nearest = Some((idx, d));
        }
    }

    let Some((idx, magnitude)) = nearest else {
        return;
    };

    if magnitude <= 0.0 {
        debug!("Waypoint {} lies on a conflict centroid, not displaced", idx);
        return;
    }

    let point = &mut waypoints[idx];
    let d_lat = (point.latitude - center.latitude) / magnitude * radius_deg;
    let d_lon = (point.longitude - center.longitude) / magnitude * radius_deg;
    point.latitude += d_lat;
    point.longitude += d_lon;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TimeRange;

    fn conflict_at(lat: f64, lon: f64) -> ConflictZone {
        ConflictZone {
            cluster_id: 0,
            cluster_center: LatLon::new(lat, lon),
            time_range: TimeRange::unknown(),
            shipping_lane_id: 0,
            shipping_lane_name: "Lane 0".to_string(),
            distance_km: 0.0,
            risk_level: 100.0,
            species: "Salmon".to_string(),
            count: 5,
        }
    }

    fn lane() -> Lane {
        Lane::new(
            "Coastal",
            vec![[0.0, -1.0], [0.05, 0.0], [0.0, 1.0]],
        )
    }

    #[test]
    fn no_conflicts_returns_the_lane_unchanged() {
        let suggestion = suggest_route(0, &lane(), &[], 20.0).unwrap();
        assert_eq!(suggestion.suggested_route, suggestion.original_route);
        assert_eq!(suggestion.message, "No conflicts detected for this lane");
        assert_eq!(suggestion.conflicts_avoided, 0);
    }

    #[test]
    fn distant_conflicts_leave_the_lane_alone() {
        let suggestion = suggest_route(0, &lane(), &[conflict_at(5.0, 5.0)], 20.0).unwrap();
        assert_eq!(suggestion.suggested_route, lane().coordinates);
        assert_eq!(suggestion.message, "Lane already avoids conflict zones");
    }

    #[test]
    fn nearest_waypoint_is_pushed_away_by_the_buffer() {
        let suggestion = suggest_route(3, &lane(), &[conflict_at(0.0, 0.0)], 20.0).unwrap();
        let radius = 20.0 / 111.32;

        assert_eq!(suggestion.lane_id, 3);
        assert_eq!(suggestion.conflicts_avoided, 1);
        assert_eq!(suggestion.message, "Modified route to avoid 1 conflict zones");
        assert_eq!(suggestion.suggested_route[0], [0.0, -1.0]);
        assert_eq!(suggestion.suggested_route[2], [0.0, 1.0]);

        let moved = suggestion.suggested_route[1];
        assert!((moved[0] - (0.05 + radius)).abs() < 1e-12);
        assert!(moved[1].abs() < 1e-12);
    }

    #[test]
    fn displacements_compound_on_the_same_waypoint() {
        let conflicts = vec![conflict_at(0.0, 0.0), conflict_at(0.0, 0.0)];
        let suggestion = suggest_route(0, &lane(), &conflicts, 20.0).unwrap();
        let radius = 20.0 / 111.32;

        assert_eq!(suggestion.conflicts_avoided, 2);
        assert!((suggestion.suggested_route[1][0] - (0.05 + 2.0 * radius)).abs() < 1e-12);
    }

    #[test]
    fn waypoint_on_the_centroid_is_not_moved() {
        let lane = Lane::new("Direct", vec![[0.0, -1.0], [0.0, 0.0], [0.0, 1.0]]);
        let suggestion = suggest_route(0, &lane, &[conflict_at(0.0, 0.0)], 20.0).unwrap();
        assert_eq!(suggestion.suggested_route, lane.coordinates);
        assert_eq!(suggestion.conflicts_avoided, 1);
    }

    #[test]
    fn invalid_inputs_are_rejected() {
        assert!(matches!(
            suggest_route(0, &lane(), &[], 0.0),
            Err(ConflictError::InvalidParameter(_))
        ));
        assert!(matches!(
            suggest_route(0, &Lane::default(), &[], 20.0),
            Err(ConflictError::InvalidParameter(_))
        ));
    }
}
