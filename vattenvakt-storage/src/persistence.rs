//! Backends for the threshold configuration.
//!
//! The store only needs "load the whole map" and "replace the whole map", so
//! the seam is a small async trait that a file, a database or a test double
//! can satisfy.

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use vattenvakt_core::model::ThresholdConfig;

use crate::error::PersistenceError;

/// Region id to alert configuration, ordered for stable file output.
pub type ThresholdMap = BTreeMap<String, ThresholdConfig>;

#[async_trait]
pub trait ThresholdPersistence: Send + Sync {
    async fn load(&self) -> Result<ThresholdMap, PersistenceError>;
    async fn save(&self, thresholds: &ThresholdMap) -> Result<(), PersistenceError>;
}

/// Distinguishes the scratch files of overlapping saves.
static SAVE_SEQ: AtomicU64 = AtomicU64::new(0);

/// Pretty-printed JSON object keyed by region id.
///
/// Entries are decoded one by one: an entry that does not parse is logged
/// and left out rather than failing the whole file. Saves go to a scratch
/// file next to the target and are renamed into place.
#[derive(Debug, Clone)]
pub struct JsonFilePersistence {
    path: PathBuf,
}

impl JsonFilePersistence {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn scratch_path(&self) -> PathBuf {
        let seq = SAVE_SEQ.fetch_add(1, Ordering::Relaxed);
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "thresholds.json".into());
        name.push(format!(".{}.{seq}.tmp", std::process::id()));
        self.path.with_file_name(name)
    }

    fn io_error(&self, source: std::io::Error) -> PersistenceError {
        PersistenceError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

#[async_trait]
impl ThresholdPersistence for JsonFilePersistence {
    async fn load(&self) -> Result<ThresholdMap, PersistenceError> {
        let raw = match tokio::fs::read(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no threshold file yet");
                return Ok(ThresholdMap::new());
            }
            Err(e) => return Err(self.io_error(e)),
        };
        let raw: Map<String, Value> = serde_json::from_slice(&raw)?;
        let mut entries = ThresholdMap::new();
        for (region_id, value) in raw {
            match serde_json::from_value::<ThresholdConfig>(value) {
                Ok(config) => {
                    entries.insert(region_id, config);
                }
                Err(e) => warn!(
                    path = %self.path.display(),
                    region = %region_id,
                    error = %e,
                    "skipping unreadable threshold entry"
                ),
            }
        }
        Ok(entries)
    }

    async fn save(&self, thresholds: &ThresholdMap) -> Result<(), PersistenceError> {
        let body = serde_json::to_vec_pretty(thresholds)?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| self.io_error(e))?;
        }
        let scratch = self.scratch_path();
        if let Err(e) = tokio::fs::write(&scratch, body).await {
            let _ = tokio::fs::remove_file(&scratch).await;
            return Err(self.io_error(e));
        }
        if let Err(e) = tokio::fs::rename(&scratch, &self.path).await {
            let _ = tokio::fs::remove_file(&scratch).await;
            return Err(self.io_error(e));
        }
        debug!(path = %self.path.display(), regions = thresholds.len(), "thresholds saved");
        Ok(())
    }
}

/// In-process backend. Can be told to fail so callers can exercise their
/// error paths.
#[derive(Debug, Default)]
pub struct MemoryPersistence {
    entries: Mutex<ThresholdMap>,
    failing: AtomicBool,
    saves: AtomicUsize,
}

impl MemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entries(entries: ThresholdMap) -> Self {
        Self {
            entries: Mutex::new(entries),
            ..Self::default()
        }
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Successful saves so far.
    pub fn saves(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    pub fn entries(&self) -> ThresholdMap {
        self.entries.lock().clone()
    }

    fn check(&self) -> Result<(), PersistenceError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(PersistenceError::Unavailable("memory backend set to fail".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl ThresholdPersistence for MemoryPersistence {
    async fn load(&self) -> Result<ThresholdMap, PersistenceError> {
        self.check()?;
        Ok(self.entries.lock().clone())
    }

    async fn save(&self, thresholds: &ThresholdMap) -> Result<(), PersistenceError> {
        self.check()?;
        *self.entries.lock() = thresholds.clone();
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
