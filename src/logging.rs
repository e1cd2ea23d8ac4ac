// src/logging.rs

//! Logging setup for `polypack` using `tracing` + `tracing-subscriber`.
//!
//! The filter comes from, in order:
//! 1. `--log-level` (a plain level for everything);
//! 2. `POLYPACK_LOG`, either a level name (`info`, `verbose`, ...) or a full
//!    `EnvFilter` directive such as `polypack::engine=debug,info`;
//! 3. `info`.
//!
//! Logs are sent to STDERR so that stdout stays free for `--dry-run` output
//! and for whatever launched runtimes print.

use anyhow::Result;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{fmt, EnvFilter};

use crate::cli::LogLevel;

/// Environment variable consulted when `--log-level` is not given.
pub const LOG_ENV: &str = "POLYPACK_LOG";

/// Initialise the global logging subscriber.
///
/// Fails if a subscriber is already installed.
pub fn init_logging(cli_level: Option<LogLevel>) -> Result<()> {
    let env_value = std::env::var(LOG_ENV).ok();
    let filter = build_filter(cli_level, env_value.as_deref());

    // Send logs to stderr; keep stdout free for dry-run and runtime output.
    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("installing tracing subscriber: {e}"))?;

    Ok(())
}

/// Resolve the subscriber filter from the CLI flag and the `POLYPACK_LOG`
/// value.
///
/// An unparseable directive falls back to `info` instead of failing startup.
pub fn build_filter(cli_level: Option<LogLevel>, env_value: Option<&str>) -> EnvFilter {
    if let Some(level) = cli_level {
        return filter_for(level_from_log_level(level));
    }

    let Some(raw) = env_value.map(str::trim).filter(|s| !s.is_empty()) else {
        return filter_for(LevelFilter::INFO);
    };

    match parse_level_str(raw) {
        Some(level) => filter_for(level),
        None => EnvFilter::try_new(raw).unwrap_or_else(|err| {
            // No subscriber yet, so tracing would drop this.
            eprintln!("polypack: ignoring invalid {LOG_ENV}={raw:?}: {err}");
            filter_for(LevelFilter::INFO)
        }),
    }
}

fn filter_for(level: LevelFilter) -> EnvFilter {
    EnvFilter::default().add_directive(level.into())
}

fn level_from_log_level(lvl: LogLevel) -> LevelFilter {
    match lvl {
        LogLevel::Error => LevelFilter::ERROR,
        LogLevel::Warn => LevelFilter::WARN,
        LogLevel::Info => LevelFilter::INFO,
        LogLevel::Debug => LevelFilter::DEBUG,
        LogLevel::Trace => LevelFilter::TRACE,
    }
}

/// Level names accepted in `POLYPACK_LOG`, including the `warning` and
/// `verbose` aliases.
pub fn parse_level_str(s: &str) -> Option<LevelFilter> {
    match s.trim().to_lowercase().as_str() {
        "off" | "silent" => Some(LevelFilter::OFF),
        "error" => Some(LevelFilter::ERROR),
        "warn" | "warning" => Some(LevelFilter::WARN),
        "info" => Some(LevelFilter::INFO),
        "debug" | "verbose" => Some(LevelFilter::DEBUG),
        "trace" => Some(LevelFilter::TRACE),
        _ => None,
    }
}
