// Copyright Catenary Transit Initiatives
// Observation, lane and conflict records shared by the analysis engine

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Cluster id given to observations that are not density-reachable from any core point.
pub const NOISE: i32 = -1;

pub const UNKNOWN_SPECIES: &str = "Unknown";

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct LatLon {
    pub latitude: f64,
    pub longitude: f64,
}

impl LatLon {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    pub fn is_valid(&self) -> bool {
        (-90.0..=90.0).contains(&self.latitude) && (-180.0..=180.0).contains(&self.longitude)
    }
}

// geo works in x = longitude, y = latitude
impl From<LatLon> for geo::Point<f64> {
    fn from(p: LatLon) -> Self {
        geo::Point::new(p.longitude, p.latitude)
    }
}

impl From<LatLon> for geo::Coord<f64> {
    fn from(p: LatLon) -> Self {
        geo::coord! { x: p.longitude, y: p.latitude }
    }
}

impl From<geo::Point<f64>> for LatLon {
    fn from(p: geo::Point<f64>) -> Self {
        LatLon::new(p.y(), p.x())
    }
}

/// A single sighting of a migrating animal (or tagged group).
///
/// The observation's identity is its position in the input list.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default, with = "optional_timestamp")]
    pub timestamp: Option<NaiveDateTime>,
    #[serde(default)]
    pub month: Option<u32>,
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(default)]
    pub species: Option<String>,
    /// `None` until clustering has run, then [`NOISE`] or a cluster index.
    #[serde(default)]
    pub cluster_id: Option<i32>,
}

impl Observation {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            timestamp: None,
            month: None,
            year: None,
            species: None,
            cluster_id: None,
        }
    }

    pub fn with_species(mut self, species: impl Into<String>) -> Self {
        self.species = Some(species.into());
        self
    }

    pub fn with_month(mut self, month: u32, year: i32) -> Self {
        self.month = Some(month);
        self.year = Some(year);
        self
    }

    pub fn with_timestamp(mut self, timestamp: NaiveDateTime) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn position(&self) -> LatLon {
        LatLon::new(self.latitude, self.longitude)
    }

    pub fn month_year(&self) -> Option<MonthKey> {
        match (self.month, self.year) {
            (Some(month), Some(year)) => Some(MonthKey { year, month }),
            _ => None,
        }
    }

    pub fn is_noise(&self) -> bool {
        self.cluster_id == Some(NOISE)
    }
}

/// A vessel traffic lane as supplied by the ingestion layer.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Lane {
    #[serde(default)]
    pub id: Option<serde_json::Value>,
    #[serde(default)]
    pub name: Option<String>,
    /// `[latitude, longitude]` pairs in travel order.
    #[serde(default)]
    pub coordinates: Vec<[f64; 2]>,
    #[serde(default)]
    pub traffic_volume: Option<f64>,
    #[serde(default)]
    pub vessel_count: Option<u64>,
    #[serde(default)]
    pub risk_level: Option<serde_json::Value>,
    #[serde(default)]
    pub description: Option<String>,
}

impl Lane {
    pub fn new(name: impl Into<String>, coordinates: Vec<[f64; 2]>) -> Self {
        Self {
            name: Some(name.into()),
            coordinates,
            ..Default::default()
        }
    }

    pub fn display_name(&self, lane_index: usize) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => format!("Lane {}", lane_index),
        }
    }

    pub fn waypoints(&self) -> Vec<LatLon> {
        self.coordinates
            .iter()
            .map(|[lat, lon]| LatLon::new(*lat, *lon))
            .collect()
    }
}

/// `[start, end]` of a cluster's activity, rendered as strings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange(pub String, pub String);

impl TimeRange {
    pub fn unknown() -> Self {
        TimeRange("Unknown".to_string(), "Unknown".to_string())
    }
}

/// Calendar month used to bucket monthly statistics. Orders chronologically.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MonthKey {
    pub year: i32,
    pub month: u32,
}

impl std::fmt::Display for MonthKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.month, self.year)
    }
}

impl Serialize for MonthKey {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// A migration cluster found within the distance threshold of a lane.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConflictZone {
    pub cluster_id: i32,
    pub cluster_center: LatLon,
    pub time_range: TimeRange,
    pub shipping_lane_id: usize,
    pub shipping_lane_name: String,
    pub distance_km: f64,
    pub risk_level: f64,
    pub species: String,
    pub count: usize,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ConflictSummary {
    pub total_conflicts: usize,
    pub avg_risk_level: f64,
    pub high_risk_count: usize,
    pub medium_risk_count: usize,
    pub low_risk_count: usize,
    pub species_affected: usize,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct MonthlyConflictStats {
    pub conflict_count: usize,
    pub avg_risk_level: f64,
    pub conflicts: Vec<ConflictZone>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RouteSuggestion {
    pub lane_id: usize,
    pub lane_name: String,
    pub original_route: Vec<[f64; 2]>,
    pub suggested_route: Vec<[f64; 2]>,
    pub message: String,
    pub conflicts_avoided: usize,
}

mod optional_timestamp {
    use super::TIMESTAMP_FORMAT;
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        value: &Option<NaiveDateTime>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(ts) => serializer.collect_str(&ts.format(TIMESTAMP_FORMAT)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<NaiveDateTime>, D::Error> {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        match raw {
            None => Ok(None),
            Some(s) if s.trim().is_empty() => Ok(None),
            Some(s) => crate::ingest::parse_timestamp(&s)
                .map(Some)
                .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {}", s))),
        }
    }
}
