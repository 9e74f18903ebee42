// Copyright Catenary Transit Initiatives
// Geodesic distance helpers for observations and lane polylines

use crate::models::LatLon;
use geo::{Closest, ClosestPoint, Distance, Geodesic, Intersects};
use geo_types::{Coord, Line, LineString, Point, Polygon};
use std::f64::consts::PI;

/// Equirectangular approximation used to turn kilometres into degrees.
pub const KM_PER_DEGREE: f64 = 111.32;

/// 16 segments per quarter circle.
const DISK_VERTICES: usize = 64;

/// Geodesic distance on the WGS-84 ellipsoid, in kilometres.
pub fn geodesic_distance_km(a: LatLon, b: LatLon) -> f64 {
    let p1: Point = a.into();
    let p2: Point = b.into();
    Geodesic.distance(p1, p2) / 1000.0
}

/// Closest location to `point` on the straight segment `start`-`end`,
/// measured in the lon/lat plane and clamped to the segment ends.
pub fn closest_point_on_segment(point: LatLon, start: LatLon, end: LatLon) -> LatLon {
    let segment = Line::new(Coord::from(start), Coord::from(end));
    let p: Point = point.into();

    match segment.closest_point(&p) {
        Closest::Intersection(hit) | Closest::SinglePoint(hit) => hit.into(),
        // zero-length segment
        Closest::Indeterminate => start,
    }
}

/// Minimum distance in km from `point` to the polyline through `waypoints`.
///
/// Every segment is considered, so the nearest location may lie strictly
/// between two waypoints. A single waypoint degrades to point-to-point
/// distance; no waypoints at all yields `None`.
pub fn point_to_polyline_distance_km(point: LatLon, waypoints: &[LatLon]) -> Option<f64> {
    match waypoints {
        [] => None,
        [only] => Some(geodesic_distance_km(point, *only)),
        _ => waypoints
            .windows(2)
            .map(|pair| {
                let nearest = closest_point_on_segment(point, pair[0], pair[1]);
                geodesic_distance_km(point, nearest)
            })
            .min_by(|a, b| a.total_cmp(b)),
    }
}

/// Arithmetic mean of latitudes and longitudes. Not a spherical centroid.
pub fn centroid<I>(points: I) -> Option<LatLon>
where
    I: IntoIterator<Item = LatLon>,
{
    let (count, sum_lat, sum_lon) = points
        .into_iter()
        .fold((0usize, 0.0, 0.0), |acc, p| {
            (acc.0 + 1, acc.1 + p.latitude, acc.2 + p.longitude)
        });

    if count == 0 {
        return None;
    }

    Some(LatLon::new(sum_lat / count as f64, sum_lon / count as f64))
}

pub fn km_to_degrees(km: f64) -> f64 {
    km / KM_PER_DEGREE
}

/// Polygon approximating a disk of `radius_deg` degrees around `center`.
pub fn buffer_disk(center: LatLon, radius_deg: f64) -> Polygon<f64> {
    let ring: Vec<Coord> = (0..DISK_VERTICES)
        .map(|i| {
            let theta = 2.0 * PI * (i as f64) / (DISK_VERTICES as f64);
            geo::coord! {
                x: center.longitude + radius_deg * theta.cos(),
                y: center.latitude + radius_deg * theta.sin(),
            }
        })
        .collect();

    // Polygon::new closes the ring
    Polygon::new(LineString::new(ring), vec![])
}

/// Whether the route through `waypoints` touches the disk.
pub fn route_intersects(waypoints: &[LatLon], disk: &Polygon<f64>) -> bool {
    match waypoints {
        [] => false,
        [only] => Point::from(*only).intersects(disk),
        _ => {
            let line: LineString = waypoints.iter().map(|p| Coord::from(*p)).collect();
            line.intersects(disk)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: f64, expected: f64, tolerance: f64) {
        assert!(
            (actual - expected).abs() <= tolerance,
            "expected {} +/- {}, got {}",
            expected,
            tolerance,
            actual
        );
    }

    #[test]
    fn one_degree_at_the_equator() {
        let origin = LatLon::new(0.0, 0.0);
        assert_close(
            geodesic_distance_km(origin, LatLon::new(1.0, 0.0)),
            110.574,
            0.01,
        );
        assert_close(
            geodesic_distance_km(origin, LatLon::new(0.0, 1.0)),
            111.319,
            0.01,
        );
    }

    #[test]
    fn distance_is_symmetric_and_zero_on_identity() {
        let a = LatLon::new(48.85, 2.35);
        let b = LatLon::new(51.5, -0.12);
        assert_close(geodesic_distance_km(a, b), geodesic_distance_km(b, a), 1e-6);
        assert_eq!(geodesic_distance_km(a, a), 0.0);
        assert!(geodesic_distance_km(a, b) > 300.0);
    }

    #[test]
    fn polyline_nearest_point_can_be_between_waypoints() {
        let lane = vec![LatLon::new(0.0, -1.0), LatLon::new(0.0, 1.0)];
        let point = LatLon::new(1.0, 0.0);

        let to_line = point_to_polyline_distance_km(point, &lane).unwrap();
        let to_vertex = geodesic_distance_km(point, lane[0]);

        assert_close(to_line, 110.574, 0.01);
        assert!(to_line < to_vertex);
    }

    #[test]
    fn point_on_the_lane_has_zero_distance() {
        let lane = vec![LatLon::new(0.0, -1.0), LatLon::new(0.0, 1.0)];
        let d = point_to_polyline_distance_km(LatLon::new(0.0, 0.0), &lane).unwrap();
        assert_close(d, 0.0, 1e-9);
    }

    #[test]
    fn projection_is_clamped_to_segment_ends() {
        let start = LatLon::new(0.0, 0.0);
        let end = LatLon::new(0.0, 1.0);
        let nearest = closest_point_on_segment(LatLon::new(0.0, 3.0), start, end);
        assert_eq!(nearest, end);
    }

    #[test]
    fn minimum_over_several_segments() {
        let lane = vec![
            LatLon::new(10.0, 10.0),
            LatLon::new(10.0, 11.0),
            LatLon::new(0.5, 11.0),
        ];
        let d = point_to_polyline_distance_km(LatLon::new(0.0, 11.0), &lane).unwrap();
        assert_close(d, geodesic_distance_km(LatLon::new(0.0, 11.0), LatLon::new(0.5, 11.0)), 1e-6);
    }

    #[test]
    fn degenerate_polylines() {
        let point = LatLon::new(0.0, 0.0);
        let single = [LatLon::new(1.0, 0.0)];
        assert_close(
            point_to_polyline_distance_km(point, &single).unwrap(),
            geodesic_distance_km(point, single[0]),
            1e-9,
        );
        assert_eq!(point_to_polyline_distance_km(point, &[]), None);

        let repeated = [LatLon::new(1.0, 0.0), LatLon::new(1.0, 0.0)];
        assert_close(
            point_to_polyline_distance_km(point, &repeated).unwrap(),
            geodesic_distance_km(point, repeated[0]),
            1e-9,
        );
    }

    #[test]
    fn centroid_is_arithmetic_mean() {
        let c = centroid(vec![LatLon::new(0.0, 0.0), LatLon::new(2.0, 4.0)]).unwrap();
        assert_eq!(c, LatLon::new(1.0, 2.0));
        assert_eq!(centroid(Vec::new()), None);
    }

    #[test]
    fn disk_intersection() {
        let disk = buffer_disk(LatLon::new(0.0, 0.0), km_to_degrees(20.0));
        let crossing = vec![LatLon::new(-1.0, 0.1), LatLon::new(1.0, 0.1)];
        let far = vec![LatLon::new(-1.0, 2.0), LatLon::new(1.0, 2.0)];

        assert!(route_intersects(&crossing, &disk));
        assert!(!route_intersects(&far, &disk));
        assert!(route_intersects(&[LatLon::new(0.05, 0.05)], &disk));
        assert!(!route_intersects(&[], &disk));
    }
}
