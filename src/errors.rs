// Copyright Catenary Transit Initiatives
// Error types surfaced by the conflict engine

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConflictError {
    /// An operation ran before the observations, lanes or conflicts it reads were available.
    #[error("Missing data: {0}")]
    MissingData(String),
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}

impl ConflictError {
    pub fn missing(what: impl Into<String>) -> Self {
        ConflictError::MissingData(what.into())
    }

    pub fn invalid(what: impl Into<String>) -> Self {
        ConflictError::InvalidParameter(what.into())
    }
}

pub type ConflictResult<T> = Result<T, ConflictError>;

/// Rejects zero, negative and NaN values for a kilometre-valued parameter.
pub fn require_positive(name: &str, value: f64) -> ConflictResult<f64> {
    if value > 0.0 && value.is_finite() {
        Ok(value)
    } else {
        Err(ConflictError::invalid(format!(
            "{} must be positive, got {}",
            name, value
        )))
    }
}
