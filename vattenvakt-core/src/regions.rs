//! Region registry and distance helpers.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::model::{round_to, Region};

/// Mean Earth radius used by the haversine distance, in kilometers.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

pub const DEFAULT_NEAREST_LIMIT: usize = 5;
pub const DEFAULT_NEAREST_RADIUS_KM: f64 = 200.0;

/// The four sites of the reference deployment, in display order.
/// The first entry is the default region.
pub fn reference_regions() -> Vec<Region> {
    vec![
        Region::new("chn-central", "Chennai Central", 13.0827, 80.2707),
        Region::new("blr-north", "Bengaluru North", 13.0358, 77.5970),
        Region::new("hyd-west", "Hyderabad West", 17.3850, 78.4867),
        Region::new("mum-coastal", "Mumbai Coastal", 19.0760, 72.8777),
    ]
}

/// A region annotated with its distance from a query point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionDistance {
    #[serde(flatten)]
    pub region: Region,
    pub distance_km: f64,
}

/// Great-circle distance between two WGS84 points.
pub fn haversine_km(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lng = (lng2 - lng1).to_radians();
    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lng / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_KM * c
}

/// Regions within `radius_km` of the point, closest first, at most `limit`.
pub fn nearest_regions(
    regions: &[Region],
    lat: f64,
    lng: f64,
    limit: usize,
    radius_km: f64,
) -> Result<Vec<RegionDistance>, CoreError> {
    if !lat.is_finite() || !lng.is_finite() {
        return Err(CoreError::InvalidCoordinates { lat, lng });
    }

    let mut within: Vec<RegionDistance> = regions
        .iter()
        .map(|region| RegionDistance {
            distance_km: round_to(haversine_km(lat, lng, region.lat, region.lng), 2),
            region: region.clone(),
        })
        .filter(|candidate| candidate.distance_km <= radius_km)
        .collect();

    within.sort_by(|a, b| a.distance_km.total_cmp(&b.distance_km));
    within.truncate(limit);
    Ok(within)
}

/// Looks a region up by id.
pub fn find_region<'a>(regions: &'a [Region], id: &str) -> Result<&'a Region, CoreError> {
    regions
        .iter()
        .find(|region| region.id == id)
        .ok_or_else(|| CoreError::UnknownRegion(id.to_string()))
}
