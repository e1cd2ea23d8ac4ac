// src/errors.rs

//! Crate-wide error aliases and helpers.

use thiserror::Error;

use crate::build::ResultMap;
use crate::identity::Signature;

#[derive(Error, Debug)]
pub enum PolypackError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Unknown task: {0} (expected dist, watch, run or watch-and-run)")]
    UnknownTask(String),

    /// At least one configuration never reported within the batch bound.
    #[error("compiler timed out with the results {}", describe_partial(.partial))]
    BatchTimeout {
        partial: ResultMap,
        missing: Vec<Signature>,
    },

    /// Shutdown was requested before every configuration reported.
    #[error("shutdown requested while {} compiler(s) had not reported", .missing.len())]
    Interrupted {
        partial: ResultMap,
        missing: Vec<Signature>,
    },

    #[error("Bundler error: {0}")]
    BundlerError(String),

    #[error("Runtime launch error: {0}")]
    LaunchError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

fn describe_partial(partial: &ResultMap) -> String {
    let entries: Vec<String> = partial
        .values()
        .map(|record| format!("{}={}", record.compiler, record.status))
        .collect();
    format!("{{{}}}", entries.join(", "))
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, PolypackError>;
