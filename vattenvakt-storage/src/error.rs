use std::path::PathBuf;

use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum StoreError {
    #[error("Unknown region: {0}")]
    UnknownRegion(String),

    #[error("Reading at {attempted} is not after the latest reading at {latest} for {region}")]
    NonMonotonicTimestamp {
        region: String,
        latest: DateTime<Utc>,
        attempted: DateTime<Utc>,
    },
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ThresholdError {
    #[error("regionId is required")]
    MissingRegionId,

    #[error("threshold must be a finite number, got {0}")]
    InvalidLimit(String),

    #[error("Unknown region: {0}")]
    UnknownRegion(String),

    #[error("Threshold configuration not saved: {0}")]
    NotSaved(String),
}

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("Threshold file I/O error ({path}): {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Threshold file is not valid JSON: {0}")]
    Format(#[from] serde_json::Error),

    #[error("Threshold backend unavailable: {0}")]
    Unavailable(String),
}
