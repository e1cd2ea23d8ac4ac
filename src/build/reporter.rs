// src/build/reporter.rs

use std::collections::BTreeMap;
use std::fmt;

use tracing::{error, info};

use crate::bundler::BuildOutcome;
use crate::identity::{Signature, SignedConfig};

/// Normalised status of one build attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildStatus {
    Success,
    Error,
}

impl fmt::Display for BuildStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildStatus::Success => f.write_str("success"),
            BuildStatus::Error => f.write_str("error"),
        }
    }
}

/// Latest result for one configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultRecord {
    pub compiler: Signature,
    pub status: BuildStatus,
}

impl ResultRecord {
    pub fn is_success(&self) -> bool {
        self.status == BuildStatus::Success
    }
}

/// Configuration identity → latest [`ResultRecord`].
pub type ResultMap = BTreeMap<Signature, ResultRecord>;

/// Interpret a build outcome for `config`.
///
/// - the bundler failed to run at all → `Error`
/// - the build ran but reported errors → `Error`
/// - otherwise → `Success`
///
/// Diagnostics are logged as a side channel; a record is always produced.
pub fn report(outcome: &BuildOutcome, config: &SignedConfig) -> ResultRecord {
    let compiler = config.signature().clone();

    let status = match outcome {
        Err(err) => {
            error!(compiler = %compiler, error = %err, "errors while building");
            BuildStatus::Error
        }
        Ok(stats) if stats.has_errors() => {
            error!(
                compiler = %compiler,
                exit_code = ?stats.exit_code,
                summary = %stats.summary(),
                "errors while building"
            );
            for line in stats.errors.iter() {
                error!(compiler = %compiler, "{}", line);
            }
            BuildStatus::Error
        }
        Ok(stats) => {
            info!(
                compiler = %compiler,
                elapsed_ms = stats.elapsed.as_millis() as u64,
                "successfully built"
            );
            BuildStatus::Success
        }
    };

    if config.verbose {
        if let Ok(stats) = outcome {
            info!(compiler = %compiler, summary = %stats.summary(), "build stats");
            for line in stats.output.iter() {
                info!(compiler = %compiler, "{}", line);
            }
        }
    }

    ResultRecord { compiler, status }
}
