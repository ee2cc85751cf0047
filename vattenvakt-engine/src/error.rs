use thiserror::Error;
use tokio::task::JoinError;

use vattenvakt_config::ConfigError;
use vattenvakt_core::CoreError;
use vattenvakt_storage::{StoreError, ThresholdError};
use vattenvakt_telemetry::TelemetryError;

#[derive(Debug, Error)]
pub enum EngineError {
    /// A region lost its series. Ends the broadcaster.
    #[error("Series invariant violated: region {0} has no readings")]
    SeriesInvariant(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Telemetry error: {0}")]
    Telemetry(#[from] TelemetryError),

    #[error("Background task failed: {0}")]
    TaskJoin(#[from] JoinError),
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum NotifyError {
    #[error("Notification channel closed")]
    ChannelClosed,

    #[error("Notification delivery failed: {0}")]
    Delivery(String),
}

/// Failures of the boundary operations.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ServiceError {
    #[error("Unknown region: {0}")]
    UnknownRegion(String),

    #[error("No data for region: {0}")]
    NoData(String),

    #[error(transparent)]
    Threshold(#[from] ThresholdError),

    #[error(transparent)]
    Core(CoreError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ServiceError {
    /// HTTP status an outer transport should answer with.
    pub fn status_code(&self) -> u16 {
        match self {
            ServiceError::UnknownRegion(_) | ServiceError::NoData(_) => 404,
            ServiceError::Threshold(ThresholdError::UnknownRegion(_)) => 404,
            ServiceError::Threshold(ThresholdError::NotSaved(_)) => 500,
            ServiceError::Threshold(_) => 400,
            ServiceError::Core(CoreError::UnknownRegion(_)) => 404,
            ServiceError::Core(CoreError::InvalidCoordinates { .. }) => 400,
            ServiceError::Internal(_) => 500,
        }
    }
}

impl From<StoreError> for ServiceError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::UnknownRegion(id) => ServiceError::UnknownRegion(id),
            other => ServiceError::Internal(other.to_string()),
        }
    }
}

impl From<CoreError> for ServiceError {
    fn from(error: CoreError) -> Self {
        match error {
            CoreError::UnknownRegion(id) => ServiceError::UnknownRegion(id),
            other => ServiceError::Core(other),
        }
    }
}
