// src/config/validate.rs

use std::collections::HashSet;

use tracing::warn;

use crate::bundler::WatchFilter;
use crate::config::model::{ConfigFile, RawConfigFile, Timings};
use crate::errors::{PolypackError, Result};
use crate::types::parse_duration;

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = crate::errors::PolypackError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        let timings = validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(
            raw.config,
            raw.bundler,
            raw.compiler,
            timings,
        ))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<Timings> {
    let timings = validate_global_config(cfg)?;
    validate_bundler(cfg)?;
    validate_compilers(cfg)?;
    Ok(timings)
}

fn validate_global_config(cfg: &RawConfigFile) -> Result<Timings> {
    let batch_timeout = parse_duration(&cfg.config.batch_timeout).map_err(|e| {
        PolypackError::ConfigError(format!("[config].batch_timeout: {e}"))
    })?;
    if batch_timeout.is_zero() {
        return Err(PolypackError::ConfigError(
            "[config].batch_timeout must be > 0".to_string(),
        ));
    }

    let poll_interval = parse_duration(&cfg.config.poll_interval).map_err(|e| {
        PolypackError::ConfigError(format!("[config].poll_interval: {e}"))
    })?;

    if cfg.config.interpreter.trim().is_empty() {
        return Err(PolypackError::ConfigError(
            "[config].interpreter must not be empty".to_string(),
        ));
    }

    Ok(Timings {
        batch_timeout,
        poll_interval,
    })
}

fn validate_bundler(cfg: &RawConfigFile) -> Result<()> {
    if cfg.bundler.cmd.trim().is_empty() {
        return Err(PolypackError::ConfigError(
            "[bundler].cmd must not be empty".to_string(),
        ));
    }

    WatchFilter::new(&cfg.bundler.watch, &cfg.bundler.exclude)
        .map_err(|e| PolypackError::ConfigError(format!("[bundler] globs: {e:#}")))?;

    Ok(())
}

fn validate_compilers(cfg: &RawConfigFile) -> Result<()> {
    if cfg.compiler.is_empty() {
        warn!("config contains no [[compiler]] entries; nothing will be built");
    }

    let mut outputs = HashSet::new();
    for (idx, compiler) in cfg.compiler.iter().enumerate() {
        if compiler.entry.as_os_str().is_empty() {
            return Err(PolypackError::ConfigError(format!(
                "compiler #{} has an empty `entry`",
                idx
            )));
        }
        if compiler.out.as_os_str().is_empty() {
            return Err(PolypackError::ConfigError(format!(
                "compiler #{} has an empty `out`",
                idx
            )));
        }
        if !outputs.insert(compiler.out.clone()) {
            return Err(PolypackError::ConfigError(format!(
                "compiler #{} writes to {:?}, which another compiler already writes to",
                idx, compiler.out
            )));
        }
    }

    Ok(())
}
