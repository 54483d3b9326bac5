// src/config/validate.rs

use std::time::Duration;

use crate::config::model::{RawSettings, Settings};
use crate::errors::{Result, SchedError};

impl TryFrom<RawSettings> for Settings {
    type Error = SchedError;

    fn try_from(raw: RawSettings) -> std::result::Result<Self, Self::Error> {
        validate_raw_settings(&raw)?;
        Ok(Settings {
            state_file: raw.scheduler.state_file,
            file_update_interval: raw.scheduler.file_update_interval,
            tick: Duration::from_secs(raw.scheduler.tick_seconds),
            stamp_policy: raw.scheduler.stamp_policy,
        })
    }
}

fn validate_raw_settings(raw: &RawSettings) -> Result<()> {
    if raw.scheduler.file_update_interval == 0 {
        return Err(SchedError::ConfigError(
            "[scheduler].file_update_interval must be >= 1 (got 0)".to_string(),
        ));
    }

    if raw.scheduler.tick_seconds == 0 {
        return Err(SchedError::ConfigError(
            "[scheduler].tick_seconds must be >= 1 (got 0)".to_string(),
        ));
    }

    if let Some(path) = &raw.scheduler.state_file {
        if path.as_os_str().is_empty() {
            return Err(SchedError::ConfigError(
                "[scheduler].state_file must not be an empty path".to_string(),
            ));
        }
    }

    Ok(())
}
