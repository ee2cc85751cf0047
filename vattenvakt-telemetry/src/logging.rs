//! ## vattenvakt-telemetry::logging
//! **Structured logging with `tracing`**
//!
//! `RUST_LOG` takes precedence over the configured level so operators can
//! raise verbosity for one module without touching the config file.

use thiserror::Error;
use tracing::info_span;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("Invalid log filter '{filter}': {reason}")]
    InvalidFilter { filter: String, reason: String },

    #[error("Global subscriber already installed: {0}")]
    AlreadyInstalled(String),

    #[error("Metrics registry error: {0}")]
    Metrics(#[from] prometheus::Error),
}

#[derive(Clone)]
pub struct EventLogger;

impl EventLogger {
    /// Installs the global fmt subscriber.
    pub fn init(default_level: &str) -> Result<(), TelemetryError> {
        let filter = match EnvFilter::try_from_default_env() {
            Ok(filter) => filter,
            Err(_) => Self::filter_for(default_level)?,
        };

        fmt()
            .with_env_filter(filter)
            .with_thread_names(true)
            .with_span_events(FmtSpan::CLOSE)
            .try_init()
            .map_err(|e| TelemetryError::AlreadyInstalled(e.to_string()))?;
        tracing::info!(default_level, "logging initialised");
        Ok(())
    }

    /// Emits one structured operational event inside its own span, with
    /// `metadata` rendered as key/value pairs.
    pub fn log_event(event_type: &str, metadata: &[(&str, String)]) {
        let span = info_span!("operational_event", event_type = event_type);
        span.in_scope(|| {
            tracing::info!(metadata = ?metadata, "{}", event_type);
        });
    }

    /// Parses a level or directive string such as `info` or
    /// `vattenvakt_engine=debug,info`.
    pub fn filter_for(directives: &str) -> Result<EnvFilter, TelemetryError> {
        EnvFilter::try_new(directives).map_err(|e| TelemetryError::InvalidFilter {
            filter: directives.to_string(),
            reason: e.to_string(),
        })
    }
}
