//! Simulation configuration: the region set and how its history is generated.

use serde::{Deserialize, Serialize};
use validator::Validate;

use vattenvakt_core::model::Region;
use vattenvakt_core::regions::reference_regions;

use crate::validation;

#[derive(Debug, Serialize, Deserialize, Validate, Clone, PartialEq)]
pub struct SimulationConfig {
    /// Base RNG seed; region `i` uses `seed + i`. Unset draws from OS entropy.
    #[serde(default)]
    pub seed: Option<u64>,

    /// Hourly samples generated per region at startup.
    #[validate(range(min = 1, max = 100_000))]
    #[serde(default = "default_history_hours")]
    pub history_hours: usize,

    /// Monitored regions in display order. The first one is the default.
    #[validate(nested)]
    #[serde(default = "default_regions")]
    pub regions: Vec<RegionConfig>,
}

#[derive(Debug, Serialize, Deserialize, Validate, Clone, PartialEq)]
pub struct RegionConfig {
    #[validate(custom(function = validation::validate_region_id))]
    pub id: String,

    #[validate(length(min = 1, max = 128))]
    pub name: String,

    #[validate(range(min = -90.0, max = 90.0))]
    pub lat: f64,

    #[validate(range(min = -180.0, max = 180.0))]
    pub lng: f64,
}

fn default_history_hours() -> usize {
    30 * 24
}

fn default_regions() -> Vec<RegionConfig> {
    reference_regions().into_iter().map(RegionConfig::from).collect()
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            seed: None,
            history_hours: default_history_hours(),
            regions: default_regions(),
        }
    }
}

impl SimulationConfig {
    pub fn region_models(&self) -> Vec<Region> {
        self.regions.iter().map(Region::from).collect()
    }

    /// Region ids that appear more than once.
    pub fn duplicate_ids(&self) -> Vec<&str> {
        let mut seen = std::collections::HashSet::new();
        let mut duplicates = Vec::new();
        for region in &self.regions {
            if !seen.insert(region.id.as_str()) && !duplicates.contains(&region.id.as_str()) {
                duplicates.push(region.id.as_str());
            }
        }
        duplicates
    }
}

impl From<Region> for RegionConfig {
    fn from(region: Region) -> Self {
        Self {
            id: region.id,
            name: region.name,
            lat: region.lat,
            lng: region.lng,
        }
    }
}

impl From<&RegionConfig> for Region {
    fn from(config: &RegionConfig) -> Self {
        Region::new(config.id.clone(), config.name.clone(), config.lat, config.lng)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_mirror_reference_deployment() {
        let config = SimulationConfig::default();
        config.validate().expect("Default config should be valid");
        assert_eq!(config.history_hours, 720);
        assert_eq!(config.seed, None);
        assert_eq!(config.region_models(), reference_regions());
    }

    #[test]
    fn rejects_out_of_range_coordinates() {
        let mut config = SimulationConfig::default();
        config.regions[2].lat = 91.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_malformed_region_id() {
        let mut config = SimulationConfig::default();
        config.regions[0].id = "Chennai Central".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn reports_duplicates_once() {
        let mut config = SimulationConfig::default();
        config.regions.push(config.regions[1].clone());
        config.regions.push(config.regions[1].clone());
        assert_eq!(config.duplicate_ids(), vec!["blr-north"]);
    }
}
