//! # vattenvakt-storage
//!
//! In-memory state of the engine.
//!
//! ### Key Submodules:
//! - `series`: per-region bounded reading series with range queries
//! - `thresholds`: per-region alert configuration
//! - `persistence`: where the alert configuration is written to

pub mod error;
pub mod persistence;
pub mod series;
pub mod thresholds;

pub use error::{PersistenceError, StoreError, ThresholdError};
pub use persistence::{JsonFilePersistence, MemoryPersistence, ThresholdMap, ThresholdPersistence};
pub use series::{RangeQuery, RegionSeriesStore, DEFAULT_CAPACITY, DEFAULT_LIMIT, MAX_LIMIT};
pub use thresholds::{ThresholdRequest, ThresholdStore, ThresholdUpdate};
