// Copyright Catenary Transit Initiatives
// Reads observation CSVs and lane JSON into the engine's records

use crate::models::{Lane, Observation};
use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};
use csv::StringRecord;
use log::{info, warn};
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const OBSERVATIONS_FILE: &str = "fish_migrations.csv";
pub const LANES_FILE: &str = "shipping_lanes.json";

const LATITUDE_COLUMNS: &[&str] = &["latitude", "lat"];
const LONGITUDE_COLUMNS: &[&str] = &["longitude", "lon", "lng", "long"];
const SPECIES_COLUMNS: &[&str] = &["species", "species_name", "name"];

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("I/O error accessing path '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("CSV error in '{path}': {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("JSON error in '{path}': {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("Missing required columns in '{path}': latitude and longitude")]
    MissingColumn { path: PathBuf },
}

/// Accepts RFC 3339, `YYYY-MM-DDTHH:MM:SS`, `YYYY-MM-DD HH:MM:SS` (either
/// with fractional seconds) and bare `YYYY-MM-DD`.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_utc());
    }

    for fmt in [
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d %H:%M:%S%.f",
    ] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(dt);
        }
    }

    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

struct ColumnMap {
    latitude: usize,
    longitude: usize,
    timestamp: Option<usize>,
    month: Option<usize>,
    year: Option<usize>,
    species: Option<usize>,
}

impl ColumnMap {
    fn resolve(headers: &StringRecord) -> Option<Self> {
        let lowered: Vec<String> = headers.iter().map(|h| h.trim().to_lowercase()).collect();

        Some(ColumnMap {
            latitude: find_column(&lowered, LATITUDE_COLUMNS)?,
            longitude: find_column(&lowered, LONGITUDE_COLUMNS)?,
            timestamp: find_column(&lowered, &["timestamp"]),
            month: find_column(&lowered, &["month"]),
            year: find_column(&lowered, &["year"]),
            species: find_column(&lowered, SPECIES_COLUMNS),
        })
    }
}

// earlier names win over later aliases
fn find_column(headers: &[String], names: &[&str]) -> Option<usize> {
    names
        .iter()
        .find_map(|name| headers.iter().position(|h| h == name))
}

fn field<'r>(record: &'r StringRecord, idx: Option<usize>) -> Option<&'r str> {
    idx.and_then(|i| record.get(i))
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

// pandas writes integer columns with gaps as floats ("3.0")
fn parse_whole<T: TryFrom<i64>>(raw: &str) -> Option<T> {
    let value = match raw.parse::<i64>() {
        Ok(v) => v,
        Err(_) => {
            let f = raw.parse::<f64>().ok()?;
            if f.fract() != 0.0 {
                return None;
            }
            f as i64
        }
    };
    T::try_from(value).ok()
}

fn observation_from_record(record: &StringRecord, columns: &ColumnMap) -> Option<Observation> {
    let latitude: f64 = field(record, Some(columns.latitude))?.parse().ok()?;
    let longitude: f64 = field(record, Some(columns.longitude))?.parse().ok()?;

    let mut obs = Observation::new(latitude, longitude);
    if !obs.position().is_valid() {
        return None;
    }

    obs.timestamp = field(record, columns.timestamp).and_then(parse_timestamp);
    obs.month = field(record, columns.month)
        .and_then(parse_whole::<u32>)
        .filter(|m| (1..=12).contains(m));
    obs.year = field(record, columns.year).and_then(parse_whole::<i32>);

    if let Some(ts) = obs.timestamp {
        if obs.month.is_none() {
            obs.month = Some(ts.month());
        }
        if obs.year.is_none() {
            obs.year = Some(ts.year());
        }
    }

    obs.species = field(record, columns.species).map(str::to_string);

    Some(obs)
}

/// Parses observations from CSV text. `source` only labels errors.
pub fn read_observations<R: Read>(reader: R, source: &Path) -> Result<Vec<Observation>, IngestError> {
    let csv_err = |e| IngestError::Csv {
        path: source.to_path_buf(),
        source: e,
    };

    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(reader);

    let headers = rdr.headers().map_err(csv_err)?.clone();
    let columns = ColumnMap::resolve(&headers).ok_or_else(|| IngestError::MissingColumn {
        path: source.to_path_buf(),
    })?;

    let mut observations = Vec::new();
    for (row, record) in rdr.records().enumerate() {
        let record = record.map_err(csv_err)?;
        match observation_from_record(&record, &columns) {
            Some(obs) => observations.push(obs),
            None => warn!(
                "Skipping row {} of {}: missing or out-of-range coordinates",
                row + 1,
                source.display()
            ),
        }
    }

    Ok(observations)
}

pub fn read_observations_csv(path: &Path) -> Result<Vec<Observation>, IngestError> {
    let file = File::open(path).map_err(|e| IngestError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    read_observations(BufReader::new(file), path)
}

/// Parses a JSON array of lane records.
pub fn read_lanes<R: Read>(reader: R, source: &Path) -> Result<Vec<Lane>, IngestError> {
    serde_json::from_reader(reader).map_err(|e| IngestError::Json {
        path: source.to_path_buf(),
        source: e,
    })
}

pub fn read_lanes_json(path: &Path) -> Result<Vec<Lane>, IngestError> {
    let file = File::open(path).map_err(|e| IngestError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    read_lanes(BufReader::new(file), path)
}

#[derive(Debug, Default)]
pub struct DataDirContents {
    pub observations: Option<Vec<Observation>>,
    pub lanes: Option<Vec<Lane>>,
}

/// Loads `fish_migrations.csv` and `shipping_lanes.json` from `dir`, each
/// only if present.
pub fn load_data_dir(dir: &Path) -> Result<DataDirContents, IngestError> {
    let mut contents = DataDirContents::default();

    let observations_path = dir.join(OBSERVATIONS_FILE);
    if observations_path.exists() {
        let observations = read_observations_csv(&observations_path)?;
        info!("Loaded migration data: {} records", observations.len());
        contents.observations = Some(observations);
    }

    let lanes_path = dir.join(LANES_FILE);
    if lanes_path.exists() {
        let lanes = read_lanes_json(&lanes_path)?;
        info!("Loaded shipping lanes: {} lanes", lanes.len());
        contents.lanes = Some(lanes);
    }

    Ok(contents)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(csv_text: &str) -> Result<Vec<Observation>, IngestError> {
        read_observations(csv_text.as_bytes(), Path::new("inline.csv"))
    }

    #[test]
    fn reads_aliased_columns() {
        let obs = parse("Lat,Lng,Species_Name\n10.5,-20.25,Herring\n").unwrap();
        assert_eq!(obs.len(), 1);
        assert_eq!(obs[0].latitude, 10.5);
        assert_eq!(obs[0].longitude, -20.25);
        assert_eq!(obs[0].species.as_deref(), Some("Herring"));
        assert_eq!(obs[0].cluster_id, None);
    }

    #[test]
    fn month_and_year_come_from_timestamp_when_absent() {
        let obs = parse("latitude,longitude,timestamp\n1,2,2023-04-17T08:30:00Z\n").unwrap();
        assert_eq!(obs[0].month, Some(4));
        assert_eq!(obs[0].year, Some(2023));
        assert!(obs[0].timestamp.is_some());
    }

    #[test]
    fn explicit_month_columns_are_kept() {
        let obs = parse("latitude,longitude,month,year,species\n1,2,11.0,2022,\n").unwrap();
        assert_eq!(obs[0].month, Some(11));
        assert_eq!(obs[0].year, Some(2022));
        assert_eq!(obs[0].species, None);
    }

    #[test]
    fn bad_rows_are_skipped() {
        let obs = parse("latitude,longitude\n95,0\nabc,1\n,\n45,45\n").unwrap();
        assert_eq!(obs.len(), 1);
        assert_eq!(obs[0].latitude, 45.0);
    }

    #[test]
    fn missing_coordinate_columns_is_an_error() {
        assert!(matches!(
            parse("x,y\n1,2\n"),
            Err(IngestError::MissingColumn { .. })
        ));
    }

    #[test]
    fn timestamp_formats() {
        assert!(parse_timestamp("2023-01-02").is_some());
        assert!(parse_timestamp("2023-01-02 03:04:05").is_some());
        assert!(parse_timestamp("2023-01-02T03:04:05.250").is_some());
        assert!(parse_timestamp("2023-01-02T03:04:05+02:00").is_some());
        assert!(parse_timestamp("yesterday").is_none());
    }

    #[test]
    fn lanes_parse_with_optional_metadata() {
        let json = r#"[
            {"id": 1, "name": "North Route", "coordinates": [[0, 0], [1, 1]], "traffic_volume": 1200, "risk_level": "high"},
            {"id": "L2"}
        ]"#;
        let lanes = read_lanes(json.as_bytes(), Path::new("inline.json")).unwrap();
        assert_eq!(lanes.len(), 2);
        assert_eq!(lanes[0].coordinates, vec![[0.0, 0.0], [1.0, 1.0]]);
        assert_eq!(lanes[0].traffic_volume, Some(1200.0));
        assert!(lanes[1].coordinates.is_empty());
    }

    #[test]
    fn data_dir_loads_present_files_only() {
        let dir = std::env::temp_dir().join(format!("kelp_ingest_test_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(LANES_FILE), r#"[{"name": "A", "coordinates": [[0,0],[0,1]]}]"#)
            .unwrap();

        let contents = load_data_dir(&dir).unwrap();
        assert!(contents.observations.is_none());
        assert_eq!(contents.lanes.unwrap().len(), 1);

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
