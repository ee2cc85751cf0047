//! ## vattenvakt-core::model
//! **Domain types shared by every crate in the workspace**
//!
//! Nothing in here performs I/O. Serialized field names follow the wire and
//! file formats the outer layers already speak (`regionId`, `threshold`,
//! `email`, `last_notified_ts`).

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// A fixed monitoring site.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub id: String,
    pub name: String,
    pub lat: f64,
    pub lng: f64,
}

impl Region {
    pub fn new(id: impl Into<String>, name: impl Into<String>, lat: f64, lng: f64) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            lat,
            lng,
        }
    }
}

/// One timestamped sensor sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub timestamp: DateTime<Utc>,
    /// Meters.
    pub water_level: f64,
    /// Degrees Celsius.
    pub temperature: f64,
    /// Microsiemens per centimeter.
    pub conductivity: f64,
}

/// Per-region alert configuration.
///
/// A region without an entry is not monitored. An entry only fires when it
/// has both a limit and a non-empty notification target.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ThresholdConfig {
    #[serde(rename = "threshold", default)]
    pub limit: Option<f64>,
    #[serde(rename = "email", default)]
    pub notify_target: Option<String>,
    #[serde(
        rename = "last_notified_ts",
        default,
        deserialize_with = "crate::time::deserialize_optional_timestamp"
    )]
    pub last_fired_at: Option<DateTime<Utc>>,
}

impl ThresholdConfig {
    /// Returns the limit and target when the entry is able to fire.
    pub fn armed(&self) -> Option<(f64, &str)> {
        let limit = self.limit?;
        match self.notify_target.as_deref() {
            Some(target) if !target.trim().is_empty() => Some((limit, target)),
            _ => None,
        }
    }

    /// `true` unless the last firing happened less than `cooldown` before `now`.
    pub fn cooldown_elapsed(&self, now: DateTime<Utc>, cooldown: Duration) -> bool {
        match self.last_fired_at {
            Some(last) => now.signed_duration_since(last) >= cooldown,
            None => true,
        }
    }
}

/// Push-channel message: a reading tagged with its region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Publication {
    #[serde(rename = "regionId")]
    pub region_id: String,
    #[serde(flatten)]
    pub reading: Reading,
}

impl Publication {
    pub fn new(region_id: impl Into<String>, reading: Reading) -> Self {
        Self {
            region_id: region_id.into(),
            reading,
        }
    }
}

/// Handed to the notification collaborator when a threshold fires.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertFired {
    #[serde(rename = "regionId")]
    pub region_id: String,
    pub water_level: f64,
    pub limit: f64,
    pub notify_target: String,
    /// Timestamp of the reading that crossed the limit.
    pub reading_at: DateTime<Utc>,
    pub fired_at: DateTime<Utc>,
}

/// Rounds half away from zero to `decimals` places.
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}
