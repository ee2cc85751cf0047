//! Custom validation functions for configuration.

use std::path::Path;

use validator::ValidationError;

/// Region ids are lowercase slugs such as `chn-central`.
pub fn validate_region_id(id: &str) -> Result<(), ValidationError> {
    let re = regex::Regex::new("^[a-z0-9]+(-[a-z0-9]+)*$")
        .map_err(|_| ValidationError::new("invalid_regex"))?;
    if re.is_match(id) {
        Ok(())
    } else {
        Err(ValidationError::new("invalid_region_id"))
    }
}

/// Accepts a bare level or comma-separated `target=level` directives.
pub fn validate_log_level(level: &str) -> Result<(), ValidationError> {
    let re = regex::Regex::new(r"^(?i)([A-Za-z0-9_:\-]+=)?(trace|debug|info|warn|error|off)$")
        .map_err(|_| ValidationError::new("invalid_regex"))?;
    let valid = !level.trim().is_empty() && level.split(',').all(|d| re.is_match(d.trim()));
    if valid {
        Ok(())
    } else {
        Err(ValidationError::new("invalid_log_level"))
    }
}

pub fn validate_path(path: &Path) -> Result<(), ValidationError> {
    if path.as_os_str().is_empty() {
        return Err(ValidationError::new("empty_path"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn region_ids() {
        assert!(validate_region_id("chn-central").is_ok());
        assert!(validate_region_id("site7").is_ok());
        assert!(validate_region_id("").is_err());
        assert!(validate_region_id("Chn Central").is_err());
        assert!(validate_region_id("-leading").is_err());
    }

    #[test]
    fn log_levels() {
        assert!(validate_log_level("info").is_ok());
        assert!(validate_log_level("WARN").is_ok());
        assert!(validate_log_level("vattenvakt_engine=debug,info").is_ok());
        assert!(validate_log_level("chatty").is_err());
        assert!(validate_log_level("").is_err());
    }
}
