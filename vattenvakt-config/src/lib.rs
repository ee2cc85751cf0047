//! # vattenvakt-config
//!
//! Layered configuration for the telemetry engine.
//!
//! ## Features
//! - **Layered sources**: defaults, YAML files and environment variables
//! - **Validation**: per-field rules via `validator`, plus cross-field
//!   consistency checks that no single field can express

#![warn(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use std::path::{Path, PathBuf};

use figment::{
    providers::{Env, Format, Serialized, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};
use validator::Validate;

mod error;
mod retention;
mod schedule;
mod simulation;
mod storage;
mod telemetry;
mod validation;

pub use error::ConfigError;
pub use retention::RetentionConfig;
pub use schedule::{BroadcastConfig, MonitorConfig};
pub use simulation::{RegionConfig, SimulationConfig};
pub use storage::StorageConfig;
pub use telemetry::TelemetryConfig;

const BASE_FILE: &str = "config/vattenvakt.yaml";
const ENV_PREFIX: &str = "VATTENVAKT_";

/// Top-level configuration container.
#[derive(Debug, Serialize, Deserialize, Validate, Default, Clone, PartialEq)]
pub struct VattenvaktConfig {
    /// Region set and history generation.
    #[validate(nested)]
    #[serde(default)]
    pub simulation: SimulationConfig,

    /// Per-region series bound and range-query paging.
    #[validate(nested)]
    #[serde(default)]
    pub retention: RetentionConfig,

    #[validate(nested)]
    #[serde(default)]
    pub broadcast: BroadcastConfig,

    #[validate(nested)]
    #[serde(default)]
    pub monitor: MonitorConfig,

    #[validate(nested)]
    #[serde(default)]
    pub storage: StorageConfig,

    #[validate(nested)]
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

impl VattenvaktConfig {
    /// Load configuration from default files and environment.
    ///
    /// Hierarchy:
    /// 1. Default values
    /// 2. `config/vattenvakt.yaml`, skipped when missing
    /// 3. `config/<VATTENVAKT_ENV>.yaml` (default `production`), skipped when missing
    /// 4. `VATTENVAKT_*` environment variables, `__` separating nested keys
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(VattenvaktConfig::default()));

        if Path::new(BASE_FILE).exists() {
            figment = figment.merge(Yaml::file(BASE_FILE));
        }

        let env = std::env::var("VATTENVAKT_ENV").unwrap_or_else(|_| "production".into());
        let env_file = format!("config/{}.yaml", env);
        if Path::new(&env_file).exists() {
            figment = figment.merge(Yaml::file(env_file));
        }

        Self::finish(figment)
    }

    /// Defaults, then the given file, then the environment.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::FileNotFound(PathBuf::from(path)));
        }

        let figment =
            Figment::from(Serialized::defaults(VattenvaktConfig::default())).merge(Yaml::file(path));
        Self::finish(figment)
    }

    fn finish(figment: Figment) -> Result<Self, ConfigError> {
        figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .map_err(ConfigError::from)
            .and_then(|config: Self| {
                config.validate_all()?;
                Ok(config)
            })
    }

    /// Field rules followed by the cross-field checks.
    pub fn validate_all(&self) -> Result<(), ConfigError> {
        self.validate()?;
        self.check_consistency()
    }

    fn check_consistency(&self) -> Result<(), ConfigError> {
        if self.simulation.regions.is_empty() {
            return Err(ConfigError::Inconsistent(
                "simulation.regions must contain at least one region".into(),
            ));
        }

        let duplicates = self.simulation.duplicate_ids();
        if !duplicates.is_empty() {
            return Err(ConfigError::Inconsistent(format!(
                "duplicate region ids: {}",
                duplicates.join(", ")
            )));
        }

        if let Some(id) = &self.broadcast.default_region {
            if !self.simulation.regions.iter().any(|r| &r.id == id) {
                return Err(ConfigError::Inconsistent(format!(
                    "broadcast.default_region '{id}' is not a configured region"
                )));
            }
        }

        if self.retention.default_limit > self.retention.max_limit {
            return Err(ConfigError::Inconsistent(format!(
                "retention.default_limit ({}) exceeds retention.max_limit ({})",
                self.retention.default_limit, self.retention.max_limit
            )));
        }

        Ok(())
    }

    /// The explicitly configured default region, else the first region.
    pub fn default_region(&self) -> Option<&str> {
        self.broadcast
            .default_region
            .as_deref()
            .or_else(|| self.simulation.regions.first().map(|r| r.id.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn full_config_validation() {
        let config = VattenvaktConfig::default();
        config.validate_all().expect("Default config should validate");
        assert_eq!(config.default_region(), Some("chn-central"));
    }

    #[test]
    fn defaults_without_any_files() {
        Jail::expect_with(|_jail| {
            let config = VattenvaktConfig::load().map_err(|e| e.to_string())?;
            assert_eq!(config, VattenvaktConfig::default());
            Ok(())
        });
    }

    #[test]
    fn files_and_environment_layer_in_order() {
        Jail::expect_with(|jail| {
            jail.create_dir("config")?;
            jail.create_file(
                "config/vattenvakt.yaml",
                r#"
simulation:
  seed: 42
  history_hours: 48
broadcast:
  interval_secs: 5
retention:
  max_readings: 500
"#,
            )?;
            jail.create_file(
                "config/staging.yaml",
                r#"
broadcast:
  interval_secs: 2
monitor:
  cooldown_secs: 120
"#,
            )?;
            jail.set_env("VATTENVAKT_ENV", "staging");
            jail.set_env("VATTENVAKT_MONITOR__INTERVAL_SECS", "15");

            let config = VattenvaktConfig::load().map_err(|e| e.to_string())?;
            assert_eq!(config.simulation.seed, Some(42));
            assert_eq!(config.simulation.history_hours, 48);
            assert_eq!(config.retention.max_readings, 500);
            assert_eq!(config.broadcast.interval_secs, 2);
            assert_eq!(config.monitor.cooldown_secs, 120);
            assert_eq!(config.monitor.interval_secs, 15);
            assert_eq!(config.simulation.regions.len(), 4);
            Ok(())
        });
    }

    #[test]
    fn custom_region_set_from_path() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "custom.yaml",
                r#"
simulation:
  regions:
    - { id: "north-well", name: "North Well", lat: 59.33, lng: 18.07 }
    - { id: "south-well", name: "South Well", lat: 55.60, lng: 13.00 }
broadcast:
  default_region: "south-well"
"#,
            )?;

            let config = VattenvaktConfig::load_from_path("custom.yaml").map_err(|e| e.to_string())?;
            let ids: Vec<_> = config.simulation.regions.iter().map(|r| r.id.as_str()).collect();
            assert_eq!(ids, vec!["north-well", "south-well"]);
            assert_eq!(config.default_region(), Some("south-well"));
            assert_eq!(config.retention.max_readings, 2000);
            Ok(())
        });
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        Jail::expect_with(|_jail| {
            let err = VattenvaktConfig::load_from_path("nope.yaml").unwrap_err();
            assert!(matches!(err, ConfigError::FileNotFound(_)));
            Ok(())
        });
    }

    #[test]
    fn unknown_default_region_is_inconsistent() {
        let mut config = VattenvaktConfig::default();
        config.broadcast.default_region = Some("atlantis".into());
        assert!(matches!(
            config.validate_all(),
            Err(ConfigError::Inconsistent(_))
        ));
    }

    #[test]
    fn duplicate_and_empty_region_sets_are_inconsistent() {
        let mut config = VattenvaktConfig::default();
        config.simulation.regions.push(config.simulation.regions[0].clone());
        assert!(matches!(
            config.validate_all(),
            Err(ConfigError::Inconsistent(_))
        ));

        config.simulation.regions.clear();
        assert!(matches!(
            config.validate_all(),
            Err(ConfigError::Inconsistent(_))
        ));
    }

    #[test]
    fn default_limit_must_fit_under_max() {
        let mut config = VattenvaktConfig::default();
        config.retention.default_limit = 6000;
        assert!(matches!(
            config.validate_all(),
            Err(ConfigError::Inconsistent(_))
        ));
    }

    #[test]
    fn invalid_values_report_the_field() {
        Jail::expect_with(|jail| {
            jail.set_env("VATTENVAKT_TELEMETRY__LOG_LEVEL", "chatty");
            let err = VattenvaktConfig::load().unwrap_err();
            assert!(matches!(err, ConfigError::Validation(_)));
            assert!(err.to_string().contains("log_level"));
            Ok(())
        });
    }
}
