// src/config/model.rs

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::types::StampPolicy;

/// Top-level configuration as read from a TOML file:
///
/// ```toml
/// [scheduler]
/// state_file = "persched.json"
/// file_update_interval = 5
/// tick_seconds = 1
/// stamp_policy = "completion"
/// ```
///
/// All fields are optional and have reasonable defaults.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawSettings {
    /// Global scheduler behaviour from `[scheduler]`.
    #[serde(default)]
    pub scheduler: RawSchedulerSection,
}

/// `[scheduler]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct RawSchedulerSection {
    /// Path of the JSON backing store for last-run instants.
    ///
    /// If unset, nothing is persisted and persistence calls are rejected.
    #[serde(default)]
    pub state_file: Option<PathBuf>,

    /// Number of driver ticks between durable writes of the state file.
    #[serde(default = "default_file_update_interval")]
    pub file_update_interval: u32,

    /// Driver loop cadence in seconds.
    #[serde(default = "default_tick_seconds")]
    pub tick_seconds: u64,

    /// When task `last` timestamps are stamped; see [`StampPolicy`].
    #[serde(default)]
    pub stamp_policy: StampPolicy,
}

fn default_file_update_interval() -> u32 {
    1
}

fn default_tick_seconds() -> u64 {
    1
}

impl Default for RawSchedulerSection {
    fn default() -> Self {
        Self {
            state_file: None,
            file_update_interval: default_file_update_interval(),
            tick_seconds: default_tick_seconds(),
            stamp_policy: StampPolicy::default(),
        }
    }
}

/// Validated settings used by the rest of the application.
///
/// Construct via `Settings::try_from(raw)`; the `TryFrom` impl lives in
/// `validate.rs`.
#[derive(Debug, Clone)]
pub struct Settings {
    pub state_file: Option<PathBuf>,
    pub file_update_interval: u32,
    pub tick: Duration,
    pub stamp_policy: StampPolicy,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            state_file: None,
            file_update_interval: default_file_update_interval(),
            tick: Duration::from_secs(default_tick_seconds()),
            stamp_policy: StampPolicy::default(),
        }
    }
}
