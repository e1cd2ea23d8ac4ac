// src/bundler/mod.rs

//! Bundler collaborator interface.
//!
//! The orchestration core never talks to a concrete bundler. It talks to a
//! [`Bundler`], which can:
//! - build a configuration once and report a [`BuildOutcome`];
//! - watch a configuration, reporting a `BuildOutcome` on every rebuild until
//!   the returned [`WatchHandle`] is closed.
//!
//! Production code uses [`CommandBundler`], which shells out to a configured
//! bundler command. Tests provide scripted fakes.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::identity::{Signature, SignedConfig};
use crate::types::Mode;

pub mod command;
pub mod filter;

pub use command::CommandBundler;
pub use filter::WatchFilter;

/// Result of a single bundler invocation.
///
/// `Err` means the bundler could not run at all; compile problems are
/// reported through `Ok(stats)` with [`BuildStats::has_errors`].
pub type BuildOutcome = std::result::Result<BuildStats, BundlerError>;

/// Boxed future returned by trait methods, so implementations can be stored
/// as `Arc<dyn Bundler>`.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

#[derive(Error, Debug)]
pub enum BundlerError {
    #[error("failed to start bundler process: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("failed to watch {path:?}: {source}")]
    Watch {
        path: PathBuf,
        #[source]
        source: notify::Error,
    },

    #[error("{0}")]
    Other(String),
}

/// Settings handed to the bundler for one configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildSettings {
    pub identity: Signature,
    pub entry: PathBuf,
    pub out: PathBuf,
    pub mode: Mode,
    pub platform: &'static str,
    /// Project root; the bundler runs here and watches below it.
    pub root: PathBuf,
}

impl BuildSettings {
    pub fn from_config(config: &SignedConfig, root: &Path) -> Self {
        Self {
            identity: config.signature().clone(),
            entry: config.entry.clone(),
            out: config.out.clone(),
            mode: config.mode,
            platform: config.context.platform(),
            root: root.to_path_buf(),
        }
    }
}

static ERROR_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(?:✘\s*)?(?:\[error\]|error(?:\s+in)?\b)[:\s]?")
        .expect("error line regex is valid")
});

static WARNING_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(?:▲\s*)?(?:\[warn(?:ing)?\]|warn(?:ing)?\b)[:\s]?")
        .expect("warning line regex is valid")
});

/// Statistics for a build that ran to completion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildStats {
    pub success: bool,
    pub exit_code: Option<i32>,
    pub elapsed: Duration,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    /// Full output, kept for verbose logging.
    pub output: Vec<String>,
}

impl BuildStats {
    pub fn succeeded() -> Self {
        Self {
            success: true,
            exit_code: Some(0),
            ..Self::default()
        }
    }

    pub fn failed(errors: Vec<String>) -> Self {
        Self {
            success: false,
            exit_code: Some(1),
            errors,
            ..Self::default()
        }
    }

    /// Build stats from a finished bundler process, sorting output lines into
    /// errors and warnings.
    pub fn from_output(exit_code: Option<i32>, elapsed: Duration, output: Vec<String>) -> Self {
        let errors = output
            .iter()
            .filter(|line| ERROR_LINE.is_match(line))
            .cloned()
            .collect();
        let warnings = output
            .iter()
            .filter(|line| WARNING_LINE.is_match(line))
            .cloned()
            .collect();

        Self {
            success: exit_code == Some(0),
            exit_code,
            elapsed,
            errors,
            warnings,
            output,
        }
    }

    pub fn has_errors(&self) -> bool {
        !self.success || !self.errors.is_empty()
    }

    pub fn summary(&self) -> String {
        format!(
            "{} error(s), {} warning(s) in {} ms",
            self.errors.len(),
            self.warnings.len(),
            self.elapsed.as_millis()
        )
    }
}

/// Abstracts the bundler that actually produces artifacts.
pub trait Bundler: Send + Sync {
    /// Execute exactly one build attempt.
    fn run<'a>(&'a self, settings: &'a BuildSettings) -> BoxFuture<'a, BuildOutcome>;

    /// Start watching: build now, then rebuild on every relevant change.
    ///
    /// Every outcome is sent on `on_build`. Rebuilds continue until the
    /// returned handle is closed.
    fn watch(
        &self,
        settings: &BuildSettings,
        poll_interval: Duration,
        on_build: mpsc::UnboundedSender<BuildOutcome>,
    ) -> std::result::Result<Box<dyn WatchHandle>, BundlerError>;
}

/// A live watch session.
pub trait WatchHandle: Send {
    /// Stop future rebuilds. Resolves once the watcher has stopped; a build
    /// already in progress finishes (and reports) first.
    fn close(self: Box<Self>) -> BoxFuture<'static, ()>;
}
