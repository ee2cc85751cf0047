//! Series retention and range-query paging limits.

use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Serialize, Deserialize, Validate, Clone, PartialEq)]
pub struct RetentionConfig {
    /// Readings kept per region; older ones are dropped from the head.
    #[validate(range(min = 1, max = 1_000_000))]
    #[serde(default = "default_max_readings")]
    pub max_readings: usize,

    /// Page size when a range query does not ask for one.
    #[validate(range(min = 1))]
    #[serde(default = "default_limit")]
    pub default_limit: usize,

    #[validate(range(min = 1))]
    #[serde(default = "default_max_limit")]
    pub max_limit: usize,
}

fn default_max_readings() -> usize {
    2000
}
fn default_limit() -> usize {
    1000
}
fn default_max_limit() -> usize {
    5000
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            max_readings: default_max_readings(),
            default_limit: default_limit(),
            max_limit: default_max_limit(),
        }
    }
}
