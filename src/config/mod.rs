// src/config/mod.rs

//! Configuration loading and validation for persched.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a config file from disk (`loader.rs`).
//! - Validate basic invariants like cadence sanity (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{load_from_path, load_or_default};
pub use model::{RawSchedulerSection, RawSettings, Settings};
