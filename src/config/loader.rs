// src/config/loader.rs

use std::fs;
use std::path::Path;

use tracing::info;

use crate::config::model::{RawSettings, Settings};
use crate::errors::Result;

/// Load settings from a given path and return the raw `RawSettings`.
///
/// This only performs TOML deserialization; it does **not** perform semantic
/// validation. Use [`load_or_default`] for that.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawSettings> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;

    let raw: RawSettings = toml::from_str(&contents)?;

    Ok(raw)
}

/// Load settings from `path`, falling back to built-in defaults when the
/// file does not exist.
///
/// This is the recommended entry point for the rest of the application:
///
/// - Missing file: defaults (no state file, persist every tick).
/// - Present file: TOML deserialization + validation via `TryFrom`.
pub fn load_or_default(path: impl AsRef<Path>) -> Result<Settings> {
    let path = path.as_ref();

    if !path.exists() {
        info!(
            path = %path.display(),
            "config file not found; using default settings"
        );
        return Ok(Settings::default());
    }

    let raw = load_from_path(path)?;
    let settings = Settings::try_from(raw)?;
    Ok(settings)
}
