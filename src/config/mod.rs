// src/config/mod.rs

//! Project file loading and validation for polypack.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a project file from disk (`loader.rs`).
//! - Validate durations, globs and build targets (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{default_config_path, load_and_validate, load_from_path, parse_str, project_root};
pub use model::{
    BuildConfig, BundlerSection, ConfigFile, ConfigSection, RawConfigFile, Timings,
};
