use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::validation;

#[derive(Debug, Serialize, Deserialize, Validate, Clone, PartialEq)]
pub struct StorageConfig {
    /// JSON file holding the per-region alert configuration.
    #[validate(custom(function = validation::validate_path))]
    #[serde(default = "default_thresholds_path")]
    pub thresholds_path: PathBuf,
}

fn default_thresholds_path() -> PathBuf {
    PathBuf::from("thresholds.json")
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            thresholds_path: default_thresholds_path(),
        }
    }
}
