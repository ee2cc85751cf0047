//! ## vattenvakt-storage::thresholds
//! **Per-region alert configuration and its persistence**
//!
//! The map sits behind a `parking_lot::RwLock` that is never held across an
//! `.await`: every mutation applies itself under the lock, takes a snapshot,
//! releases the guard and only then writes the snapshot out. A failed write
//! is logged and counted; the in-memory change stands and is not retried.
//! Concurrent writers are last-write-wins.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use tracing::{debug, error, info, warn};

use vattenvakt_core::model::ThresholdConfig;
use vattenvakt_telemetry::MetricsRecorder;

use crate::error::ThresholdError;
use crate::persistence::{ThresholdMap, ThresholdPersistence};

/// A validated change to one region's configuration.
///
/// `limit: None` leaves the limit untouched. `notify_target` distinguishes
/// "not given" (`None`) from "cleared" (`Some(None)`).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ThresholdUpdate {
    pub region_id: String,
    pub limit: Option<f64>,
    pub notify_target: Option<Option<String>>,
}

impl ThresholdUpdate {
    pub fn new(region_id: impl Into<String>) -> Self {
        Self {
            region_id: region_id.into(),
            ..Default::default()
        }
    }

    pub fn limit(mut self, limit: f64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn notify_target(mut self, target: Option<String>) -> Self {
        self.notify_target = Some(target);
        self
    }

    fn validate(&self) -> Result<(), ThresholdError> {
        if self.region_id.trim().is_empty() {
            return Err(ThresholdError::MissingRegionId);
        }
        match self.limit {
            Some(limit) if !limit.is_finite() => Err(ThresholdError::InvalidLimit(limit.to_string())),
            _ => Ok(()),
        }
    }
}

/// Raw configuration body as an outer layer receives it.
///
/// `threshold` accepts a number or a numeric string; `email: null` clears
/// the target while an omitted `email` leaves it alone.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ThresholdRequest {
    #[serde(rename = "regionId", default)]
    pub region_id: Option<String>,
    #[serde(default)]
    pub threshold: Option<Value>,
    #[serde(default, deserialize_with = "present")]
    pub email: Option<Option<String>>,
}

fn present<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

impl TryFrom<ThresholdRequest> for ThresholdUpdate {
    type Error = ThresholdError;

    fn try_from(request: ThresholdRequest) -> Result<Self, Self::Error> {
        let region_id = request
            .region_id
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .ok_or(ThresholdError::MissingRegionId)?;

        let limit = match request.threshold {
            None | Some(Value::Null) => None,
            Some(Value::Number(n)) => Some(
                n.as_f64()
                    .ok_or_else(|| ThresholdError::InvalidLimit(n.to_string()))?,
            ),
            Some(Value::String(s)) if s.trim().is_empty() => None,
            Some(Value::String(s)) => Some(
                s.trim()
                    .parse::<f64>()
                    .map_err(|_| ThresholdError::InvalidLimit(s.clone()))?,
            ),
            Some(other) => return Err(ThresholdError::InvalidLimit(other.to_string())),
        };

        let update = ThresholdUpdate {
            region_id,
            limit,
            notify_target: request.email,
        };
        update.validate()?;
        Ok(update)
    }
}

pub struct ThresholdStore {
    entries: RwLock<ThresholdMap>,
    persistence: Arc<dyn ThresholdPersistence>,
    metrics: Option<Arc<MetricsRecorder>>,
}

impl std::fmt::Debug for ThresholdStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThresholdStore")
            .field("entries", &*self.entries.read())
            .finish_non_exhaustive()
    }
}

impl ThresholdStore {
    /// Empty store writing through to `persistence`.
    pub fn new(persistence: Arc<dyn ThresholdPersistence>) -> Self {
        Self {
            entries: RwLock::new(ThresholdMap::new()),
            persistence,
            metrics: None,
        }
    }

    /// Store primed from whatever `persistence` holds. An unreadable backend
    /// is logged and yields an empty map.
    pub async fn load(persistence: Arc<dyn ThresholdPersistence>) -> Self {
        let entries = match persistence.load().await {
            Ok(entries) => {
                info!(regions = entries.len(), "loaded threshold configuration");
                entries
            }
            Err(e) => {
                warn!(error = %e, "threshold configuration unreadable, starting empty");
                ThresholdMap::new()
            }
        };
        Self {
            entries: RwLock::new(entries),
            persistence,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<MetricsRecorder>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn snapshot(&self) -> ThresholdMap {
        self.entries.read().clone()
    }

    pub fn get(&self, region_id: &str) -> Option<ThresholdConfig> {
        self.entries.read().get(region_id).cloned()
    }

    /// Creates or updates one entry and persists the whole map.
    pub async fn configure(&self, update: ThresholdUpdate) -> Result<ThresholdConfig, ThresholdError> {
        let (entry, snapshot) = self.apply(update)?;
        self.persist(&snapshot).await;
        Ok(entry)
    }

    /// Like [`ThresholdStore::configure`], but a failed write is returned as
    /// [`ThresholdError::NotSaved`] instead of only being logged. The
    /// in-memory change stands either way.
    pub async fn configure_persisted(
        &self,
        update: ThresholdUpdate,
    ) -> Result<ThresholdConfig, ThresholdError> {
        let (entry, snapshot) = self.apply(update)?;
        self.persistence.save(&snapshot).await.map_err(|e| {
            self.count_persist_failure();
            ThresholdError::NotSaved(e.to_string())
        })?;
        Ok(entry)
    }

    fn apply(&self, update: ThresholdUpdate) -> Result<(ThresholdConfig, ThresholdMap), ThresholdError> {
        update.validate()?;

        let (entry, snapshot) = {
            let mut entries = self.entries.write();
            let entry = entries.entry(update.region_id.clone()).or_default();
            if let Some(limit) = update.limit {
                entry.limit = Some(limit);
            }
            if let Some(target) = update.notify_target {
                entry.notify_target = target.filter(|t| !t.trim().is_empty());
            }
            (entry.clone(), entries.clone())
        };

        debug!(region = %update.region_id, ?entry, "threshold configured");
        Ok((entry, snapshot))
    }

    /// Stamps a firing and persists the whole map.
    pub async fn record_fired(&self, region_id: &str, at: DateTime<Utc>) {
        let snapshot = {
            let mut entries = self.entries.write();
            entries.entry(region_id.to_string()).or_default().last_fired_at = Some(at);
            entries.clone()
        };
        self.persist(&snapshot).await;
    }

    async fn persist(&self, snapshot: &ThresholdMap) {
        if let Err(e) = self.persistence.save(snapshot).await {
            error!(error = %e, "failed to persist threshold configuration");
            self.count_persist_failure();
        }
    }

    fn count_persist_failure(&self) {
        if let Some(metrics) = &self.metrics {
            metrics.persist_failures.inc();
        }
    }
}
