// Copyright Catenary Transit Initiatives
// Analysis parameters and where the input data lives

use crate::clustering::{DEFAULT_EPS_KM, DEFAULT_MIN_SAMPLES};
use crate::errors::{ConflictError, ConflictResult, require_positive};
use crate::route_suggestion::DEFAULT_BUFFER_KM;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_DISTANCE_THRESHOLD_KM: f64 = 10.0;

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct AnalysisConfig {
    pub data_dir: PathBuf,
    // clustering
    pub eps_km: f64,
    pub min_samples: usize,
    // conflict scoring
    pub distance_threshold_km: f64,
    // route suggestions
    pub buffer_km: f64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            eps_km: DEFAULT_EPS_KM,
            min_samples: DEFAULT_MIN_SAMPLES,
            distance_threshold_km: DEFAULT_DISTANCE_THRESHOLD_KM,
            buffer_km: DEFAULT_BUFFER_KM,
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Unable to read config '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Unable to parse config '{path}': {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: ron::error::SpannedError,
    },
    #[error(transparent)]
    Invalid(#[from] ConflictError),
}

impl AnalysisConfig {
    /// Reads a RON file; fields left out keep their defaults.
    pub fn from_ron_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        let config = Self::from_ron_str(&text).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            source: e,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_ron_str(text: &str) -> Result<Self, ron::error::SpannedError> {
        ron::from_str(text)
    }

    pub fn validate(&self) -> ConflictResult<()> {
        require_positive("eps_km", self.eps_km)?;
        require_positive("distance_threshold_km", self.distance_threshold_km)?;
        require_positive("buffer_km", self.buffer_km)?;
        if self.min_samples == 0 {
            return Err(ConflictError::invalid("min_samples must be positive, got 0"));
        }
        Ok(())
    }
}
