//! Boundary operations, shaped for an HTTP or socket layer to call.
//!
//! Raw query parameters go in as strings; the service owns defaulting,
//! region resolution and the mapping of failures to [`ServiceError`].

use std::sync::Arc;

use vattenvakt_core::model::{Publication, Reading, Region, ThresholdConfig};
use vattenvakt_core::regions::{self, RegionDistance, DEFAULT_NEAREST_LIMIT, DEFAULT_NEAREST_RADIUS_KM};
use vattenvakt_storage::{
    RangeQuery, RegionSeriesStore, ThresholdError, ThresholdMap, ThresholdRequest, ThresholdStore,
    ThresholdUpdate,
};

use crate::broadcaster::{Broadcaster, Subscription};
use crate::error::ServiceError;

#[derive(Clone)]
pub struct MonitoringService {
    regions: Arc<Vec<Region>>,
    store: Arc<RegionSeriesStore>,
    thresholds: Arc<ThresholdStore>,
    broadcaster: Arc<Broadcaster>,
    default_limit: usize,
    max_limit: usize,
}

impl MonitoringService {
    pub fn new(
        regions: Arc<Vec<Region>>,
        store: Arc<RegionSeriesStore>,
        thresholds: Arc<ThresholdStore>,
        broadcaster: Arc<Broadcaster>,
        default_limit: usize,
        max_limit: usize,
    ) -> Self {
        Self {
            regions,
            store,
            thresholds,
            broadcaster,
            default_limit,
            max_limit,
        }
    }

    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    /// Paged readings of one region; a missing id means the default region.
    pub fn series(
        &self,
        region_id: Option<&str>,
        start: Option<&str>,
        end: Option<&str>,
        offset: Option<&str>,
        limit: Option<&str>,
    ) -> Result<Vec<Reading>, ServiceError> {
        let region_id = self.resolve(region_id)?;
        let query =
            RangeQuery::parse_with(start, end, offset, limit, self.default_limit, self.max_limit);
        Ok(self.store.range(region_id, &query)?)
    }

    pub fn latest(&self, region_id: Option<&str>) -> Result<Publication, ServiceError> {
        let region_id = self.resolve(region_id)?;
        self.store
            .latest(region_id)?
            .map(|reading| Publication::new(region_id, reading))
            .ok_or_else(|| ServiceError::NoData(region_id.to_string()))
    }

    pub fn subscribe(&self) -> Subscription {
        self.broadcaster.subscribe()
    }

    pub fn thresholds(&self) -> ThresholdMap {
        self.thresholds.snapshot()
    }

    pub async fn configure_threshold(
        &self,
        update: ThresholdUpdate,
    ) -> Result<ThresholdConfig, ServiceError> {
        let region_id = update.region_id.trim();
        if region_id.is_empty() {
            return Err(ThresholdError::MissingRegionId.into());
        }
        if !self.store.contains(region_id) {
            return Err(ThresholdError::UnknownRegion(region_id.to_string()).into());
        }
        let update = ThresholdUpdate {
            region_id: region_id.to_string(),
            ..update
        };
        Ok(self.thresholds.configure(update).await?)
    }

    /// Same as [`MonitoringService::configure_threshold`] for an unvalidated body.
    pub async fn configure_threshold_request(
        &self,
        request: ThresholdRequest,
    ) -> Result<ThresholdConfig, ServiceError> {
        self.configure_threshold(ThresholdUpdate::try_from(request)?)
            .await
    }

    pub fn nearest_regions(
        &self,
        lat: f64,
        lng: f64,
        limit: Option<usize>,
        radius_km: Option<f64>,
    ) -> Result<Vec<RegionDistance>, ServiceError> {
        Ok(regions::nearest_regions(
            &self.regions,
            lat,
            lng,
            limit.unwrap_or(DEFAULT_NEAREST_LIMIT),
            radius_km.unwrap_or(DEFAULT_NEAREST_RADIUS_KM),
        )?)
    }

    fn resolve<'a>(&'a self, region_id: Option<&'a str>) -> Result<&'a str, ServiceError> {
        match region_id.map(str::trim).filter(|id| !id.is_empty()) {
            None => Ok(self.broadcaster.default_region()),
            Some(id) if self.store.contains(id) => Ok(id),
            Some(id) => Err(ServiceError::UnknownRegion(id.to_string())),
        }
    }
}
