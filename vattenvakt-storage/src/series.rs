//! ## vattenvakt-storage::series
//! **Bounded per-region reading series**
//!
//! The region set is fixed when the store is built, so the outer map never
//! changes and needs no lock. Every series has its own `RwLock`: an append
//! and its head truncation happen under one write guard, so readers never
//! observe a half-truncated series, while different regions proceed
//! independently.

use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tracing::trace;

use vattenvakt_core::model::Reading;
pub use vattenvakt_core::time::parse_timestamp;

use crate::error::StoreError;

/// Readings retained per region.
pub const DEFAULT_CAPACITY: usize = 2000;
/// Page size when the caller does not ask for one.
pub const DEFAULT_LIMIT: usize = 1000;
/// Hard cap on the page size, whatever the caller asks for.
pub const MAX_LIMIT: usize = 5000;

/// Inclusive time filter plus a position window over the filtered result.
#[derive(Debug, Clone, PartialEq)]
pub struct RangeQuery {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub offset: usize,
    pub limit: usize,
}

impl Default for RangeQuery {
    fn default() -> Self {
        Self {
            start: None,
            end: None,
            offset: 0,
            limit: DEFAULT_LIMIT,
        }
    }
}

impl RangeQuery {
    /// Builds a query from raw boundary parameters.
    ///
    /// Malformed values never fail the query: unparseable dates drop the
    /// bound, a bad offset becomes 0 and a bad or non-positive limit becomes
    /// [`DEFAULT_LIMIT`]. The limit is capped at [`MAX_LIMIT`].
    pub fn parse(
        start: Option<&str>,
        end: Option<&str>,
        offset: Option<&str>,
        limit: Option<&str>,
    ) -> Self {
        Self::parse_with(start, end, offset, limit, DEFAULT_LIMIT, MAX_LIMIT)
    }

    /// [`RangeQuery::parse`] with deployment-specific paging limits.
    pub fn parse_with(
        start: Option<&str>,
        end: Option<&str>,
        offset: Option<&str>,
        limit: Option<&str>,
        default_limit: usize,
        max_limit: usize,
    ) -> Self {
        let offset = offset
            .and_then(|raw| raw.trim().parse::<i64>().ok())
            .filter(|n| *n > 0)
            .map_or(0, |n| usize::try_from(n).unwrap_or(usize::MAX));
        let limit = limit
            .and_then(|raw| raw.trim().parse::<i64>().ok())
            .filter(|n| *n > 0)
            .map_or(default_limit, |n| usize::try_from(n).unwrap_or(max_limit));

        Self {
            start: start.and_then(parse_timestamp),
            end: end.and_then(parse_timestamp),
            offset,
            limit,
        }
        .capped(max_limit)
    }

    /// Clamps the limit into `[1, max_limit]`.
    pub fn capped(mut self, max_limit: usize) -> Self {
        self.limit = self.limit.clamp(1, max_limit.max(1));
        self
    }

    fn admits(&self, timestamp: DateTime<Utc>) -> bool {
        self.start.is_none_or(|start| timestamp >= start)
            && self.end.is_none_or(|end| timestamp <= end)
    }
}

/// Per-region bounded, chronologically ordered readings.
#[derive(Debug)]
pub struct RegionSeriesStore {
    order: Vec<String>,
    series: HashMap<String, RwLock<VecDeque<Reading>>>,
    capacity: usize,
}

impl RegionSeriesStore {
    /// Creates one empty series per region id, each bounded to `capacity`.
    pub fn new<I, S>(region_ids: I, capacity: usize) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let capacity = capacity.max(1);
        let mut order = Vec::new();
        let mut series = HashMap::new();
        for id in region_ids {
            let id = id.into();
            if series.contains_key(&id) {
                continue;
            }
            series.insert(id.clone(), RwLock::new(VecDeque::with_capacity(capacity)));
            order.push(id);
        }
        Self {
            order,
            series,
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Region ids in construction order.
    pub fn region_ids(&self) -> &[String] {
        &self.order
    }

    pub fn contains(&self, region_id: &str) -> bool {
        self.series.contains_key(region_id)
    }

    fn slot(&self, region_id: &str) -> Result<&RwLock<VecDeque<Reading>>, StoreError> {
        self.series
            .get(region_id)
            .ok_or_else(|| StoreError::UnknownRegion(region_id.to_string()))
    }

    /// Replaces a series with chronologically ordered history, keeping the
    /// most recent `capacity` readings.
    pub fn seed(&self, region_id: &str, readings: Vec<Reading>) -> Result<(), StoreError> {
        debug_assert!(readings.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
        let skip = readings.len().saturating_sub(self.capacity);
        let mut series = self.slot(region_id)?.write();
        series.clear();
        series.extend(readings.into_iter().skip(skip));
        Ok(())
    }

    /// Appends to the tail and trims the head back to capacity.
    pub fn append(&self, region_id: &str, reading: Reading) -> Result<(), StoreError> {
        let mut series = self.slot(region_id)?.write();
        if let Some(last) = series.back() {
            if reading.timestamp <= last.timestamp {
                return Err(StoreError::NonMonotonicTimestamp {
                    region: region_id.to_string(),
                    latest: last.timestamp,
                    attempted: reading.timestamp,
                });
            }
        }
        series.push_back(reading);
        while series.len() > self.capacity {
            series.pop_front();
        }
        trace!(region = region_id, len = series.len(), "reading appended");
        Ok(())
    }

    pub fn latest(&self, region_id: &str) -> Result<Option<Reading>, StoreError> {
        Ok(self.slot(region_id)?.read().back().cloned())
    }

    pub fn len(&self, region_id: &str) -> Result<usize, StoreError> {
        Ok(self.slot(region_id)?.read().len())
    }

    /// Copy of the whole series.
    pub fn snapshot(&self, region_id: &str) -> Result<Vec<Reading>, StoreError> {
        Ok(self.slot(region_id)?.read().iter().cloned().collect())
    }

    /// Readings within `[start, end]`, then the `[offset, offset + limit)`
    /// window of that filtered sequence.
    pub fn range(&self, region_id: &str, query: &RangeQuery) -> Result<Vec<Reading>, StoreError> {
        let series = self.slot(region_id)?.read();
        Ok(series
            .iter()
            .filter(|reading| query.admits(reading.timestamp))
            .skip(query.offset)
            .take(query.limit)
            .cloned()
            .collect())
    }
}
