//! Tick periods of the broadcaster and the threshold monitor.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Serialize, Deserialize, Validate, Clone, PartialEq)]
pub struct BroadcastConfig {
    #[validate(range(min = 1, max = 3600))]
    #[serde(default = "default_broadcast_interval")]
    pub interval_secs: u64,

    /// Region whose latest reading greets new subscribers. Unset means the
    /// first configured region.
    #[serde(default)]
    pub default_region: Option<String>,

    /// Publications buffered per subscriber before the oldest are dropped.
    #[validate(range(min = 1, max = 65_536))]
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

fn default_broadcast_interval() -> u64 {
    10
}
fn default_channel_capacity() -> usize {
    256
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_broadcast_interval(),
            default_region: None,
            channel_capacity: default_channel_capacity(),
        }
    }
}

impl BroadcastConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

#[derive(Debug, Serialize, Deserialize, Validate, Clone, PartialEq)]
pub struct MonitorConfig {
    #[validate(range(min = 1, max = 86_400))]
    #[serde(default = "default_monitor_interval")]
    pub interval_secs: u64,

    /// Minimum gap between two firings for the same region.
    #[validate(range(max = 604_800))]
    #[serde(default = "default_cooldown")]
    pub cooldown_secs: u64,
}

fn default_monitor_interval() -> u64 {
    60
}
fn default_cooldown() -> u64 {
    3600
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_monitor_interval(),
            cooldown_secs: default_cooldown(),
        }
    }
}

impl MonitorConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }
}
