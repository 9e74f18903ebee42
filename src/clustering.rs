// Copyright Catenary Transit Initiatives
// Density-based clustering of migration observations

use crate::errors::{ConflictError, ConflictResult, require_positive};
use crate::geometry::{centroid, geodesic_distance_km};
use crate::models::{
    LatLon, MonthKey, NOISE, Observation, TIMESTAMP_FORMAT, TimeRange, UNKNOWN_SPECIES,
};
use log::{debug, info};
use rayon::prelude::*;
use serde::Serialize;
use std::collections::{BTreeMap, VecDeque};

pub const DEFAULT_EPS_KM: f64 = 50.0;
pub const DEFAULT_MIN_SAMPLES: usize = 5;

/// Dense symmetric matrix of pairwise geodesic distances (km).
///
/// Memory and build time are both O(n^2); this is the practical ceiling on
/// input size. A spatial index over a geodesic metric would lift it without
/// changing the clustering result.
pub struct DistanceMatrix {
    size: usize,
    cells: Vec<f64>,
}

impl DistanceMatrix {
    pub fn build(points: &[LatLon]) -> Self {
        let size = points.len();

        // Rows are independent. Each pair is always evaluated with the lower
        // index first so (i, j) and (j, i) hold the identical value.
        let cells: Vec<f64> = (0..size)
            .into_par_iter()
            .flat_map_iter(|i| {
                (0..size).map(move |j| match i.cmp(&j) {
                    std::cmp::Ordering::Equal => 0.0,
                    std::cmp::Ordering::Less => geodesic_distance_km(points[i], points[j]),
                    std::cmp::Ordering::Greater => geodesic_distance_km(points[j], points[i]),
                })
            })
            .collect();

        Self { size, cells }
    }

    pub fn len(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.cells[i * self.size + j]
    }

    /// Indices within `eps_km` of `i` (inclusive), `i` itself included.
    pub fn neighbors(&self, i: usize, eps_km: f64) -> Vec<usize> {
        let row = &self.cells[i * self.size..(i + 1) * self.size];
        row.iter()
            .enumerate()
            .filter(|(_, d)| **d <= eps_km)
            .map(|(j, _)| j)
            .collect()
    }
}

/// Label every point with a cluster index or [`NOISE`].
///
/// Points are scanned in input order. An unlabelled core point opens the
/// next cluster id, which then grows breadth-first through the neighbourhoods
/// of its core members. Border points join the first cluster that reaches
/// them and never expand it.
pub fn density_labels(points: &[LatLon], eps_km: f64, min_samples: usize) -> Vec<i32> {
    let matrix = DistanceMatrix::build(points);

    let neighborhoods: Vec<Vec<usize>> = (0..matrix.len())
        .map(|i| matrix.neighbors(i, eps_km))
        .collect();
    let is_core: Vec<bool> = neighborhoods
        .iter()
        .map(|nb| nb.len() >= min_samples)
        .collect();

    let mut labels: Vec<Option<i32>> = vec![None; points.len()];
    let mut next_cluster: i32 = 0;

    for seed in 0..points.len() {
        if labels[seed].is_some() || !is_core[seed] {
            continue;
        }

        let cluster = next_cluster;
        next_cluster += 1;
        labels[seed] = Some(cluster);

        let mut queue = VecDeque::from([seed]);
        let mut grown = 1usize;

        // only core points are ever queued
        while let Some(current) = queue.pop_front() {
            for &neighbor in &neighborhoods[current] {
                if labels[neighbor].is_none() {
                    labels[neighbor] = Some(cluster);
                    grown += 1;
                    if is_core[neighbor] {
                        queue.push_back(neighbor);
                    }
                }
            }
        }

        debug!("Cluster {} opened at point {} with {} members", cluster, seed, grown);
    }

    labels.into_iter().map(|l| l.unwrap_or(NOISE)).collect()
}

/// Returns a copy of `observations` with `cluster_id` assigned.
///
/// Any previous assignment is overwritten. For identical input order and
/// parameters the result is always the same.
pub fn cluster_observations(
    observations: &[Observation],
    eps_km: f64,
    min_samples: usize,
) -> ConflictResult<Vec<Observation>> {
    require_positive("eps_km", eps_km)?;
    if min_samples == 0 {
        return Err(ConflictError::invalid("min_samples must be positive, got 0"));
    }

    let points: Vec<LatLon> = observations.iter().map(Observation::position).collect();
    let labels = density_labels(&points, eps_km, min_samples);

    let clustered: Vec<Observation> = observations
        .iter()
        .zip(labels)
        .map(|(obs, label)| Observation {
            cluster_id: Some(label),
            ..obs.clone()
        })
        .collect();

    let report = ClusteringReport::from_observations(&clustered);
    info!(
        "Identified {} migration clusters ({} noise points) from {} observations",
        report.n_clusters,
        report.noise_points,
        clustered.len()
    );

    Ok(clustered)
}

/// True when every observation carries a cluster assignment.
pub fn is_clustered(observations: &[Observation]) -> bool {
    observations.iter().all(|o| o.cluster_id.is_some())
}

/// The observations sharing one non-negative cluster id.
#[derive(Debug, Clone, PartialEq)]
pub struct Cluster {
    pub cluster_id: i32,
    /// Indices into the observation list.
    pub members: Vec<usize>,
    pub centroid: LatLon,
    pub time_range: TimeRange,
    pub species: String,
}

impl Cluster {
    pub fn size(&self) -> usize {
        self.members.len()
    }
}

/// Groups clustered observations by id, ascending. Noise and unlabelled
/// observations are left out.
pub fn group_clusters(observations: &[Observation]) -> Vec<Cluster> {
    let mut by_id: BTreeMap<i32, Vec<usize>> = BTreeMap::new();
    for (idx, obs) in observations.iter().enumerate() {
        if let Some(id) = obs.cluster_id.filter(|id| *id >= 0) {
            by_id.entry(id).or_default().push(idx);
        }
    }

    by_id
        .into_iter()
        .filter_map(|(cluster_id, members)| {
            let member_obs: Vec<&Observation> =
                members.iter().map(|&i| &observations[i]).collect();
            let centroid = centroid(member_obs.iter().map(|o| o.position()))?;

            Some(Cluster {
                cluster_id,
                time_range: time_range(&member_obs),
                species: first_species(&member_obs),
                centroid,
                members,
            })
        })
        .collect()
}

fn time_range(members: &[&Observation]) -> TimeRange {
    let timestamps = members.iter().filter_map(|o| o.timestamp);
    if let (Some(start), Some(end)) = (timestamps.clone().min(), timestamps.max()) {
        return TimeRange(
            start.format(TIMESTAMP_FORMAT).to_string(),
            end.format(TIMESTAMP_FORMAT).to_string(),
        );
    }

    let months = members.iter().filter_map(|o| o.month_year());
    match (months.clone().min(), months.max()) {
        (Some(start), Some(end)) => TimeRange(start.to_string(), end.to_string()),
        _ => TimeRange::unknown(),
    }
}

fn first_species(members: &[&Observation]) -> String {
    members
        .iter()
        .find_map(|o| o.species.clone())
        .unwrap_or_else(|| UNKNOWN_SPECIES.to_string())
}

/// Distinct months a cluster was observed in.
pub fn cluster_months(observations: &[Observation], cluster_id: i32) -> Vec<MonthKey> {
    let mut months: Vec<MonthKey> = Vec::new();
    for obs in observations.iter().filter(|o| o.cluster_id == Some(cluster_id)) {
        if let Some(key) = obs.month_year() {
            if !months.contains(&key) {
                months.push(key);
            }
        }
    }
    months
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ClusteringReport {
    pub n_clusters: usize,
    pub noise_points: usize,
    pub cluster_sizes: Vec<usize>,
}

impl ClusteringReport {
    pub fn from_observations(observations: &[Observation]) -> Self {
        let clusters = group_clusters(observations);
        Self {
            n_clusters: clusters.len(),
            noise_points: observations.iter().filter(|o| o.is_noise()).count(),
            cluster_sizes: clusters.iter().map(Cluster::size).collect(),
        }
    }
}
