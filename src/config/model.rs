// src/config/model.rs

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::types::{Context, Mode, RebuildAction};

/// Configuration as read from a TOML file, before validation.
///
/// ```toml
/// [config]
/// batch_timeout = "100s"
/// poll_interval = "250ms"
///
/// [bundler]
/// cmd = "esbuild {entry} --bundle --outfile={out} --platform={platform}"
/// watch = ["src/**"]
///
/// [[compiler]]
/// entry = "src/server.js"
/// out = "dist/server.js"
/// run = true
/// ```
///
/// All sections are optional and have reasonable defaults. Use
/// `ConfigFile::try_from` to obtain a validated [`ConfigFile`].
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawConfigFile {
    #[serde(default)]
    pub config: ConfigSection,

    #[serde(default)]
    pub bundler: BundlerSection,

    /// One entry per build target, from `[[compiler]]`.
    #[serde(default)]
    pub compiler: Vec<BuildConfig>,
}

/// `[config]` section: orchestration behaviour.
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigSection {
    /// Upper bound for a batch of builds to report, e.g. `"100s"`.
    #[serde(default = "default_batch_timeout")]
    pub batch_timeout: String,

    /// How long watch mode aggregates file events before rebuilding.
    #[serde(default = "default_poll_interval")]
    pub poll_interval: String,

    /// Program used to launch run-flagged outputs.
    #[serde(default = "default_interpreter")]
    pub interpreter: String,
}

fn default_batch_timeout() -> String {
    "100s".to_string()
}

fn default_poll_interval() -> String {
    "250ms".to_string()
}

fn default_interpreter() -> String {
    "node".to_string()
}

impl Default for ConfigSection {
    fn default() -> Self {
        Self {
            batch_timeout: default_batch_timeout(),
            poll_interval: default_poll_interval(),
            interpreter: default_interpreter(),
        }
    }
}

/// `[bundler]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct BundlerSection {
    /// Command template; `{entry}`, `{out}`, `{mode}` and `{platform}` are
    /// substituted per configuration.
    #[serde(default = "default_bundler_cmd")]
    pub cmd: String,

    /// Globs (relative to the project root) that re-trigger builds in watch mode.
    #[serde(default = "default_bundler_watch")]
    pub watch: Vec<String>,

    #[serde(default)]
    pub exclude: Vec<String>,
}

fn default_bundler_cmd() -> String {
    "esbuild {entry} --bundle --outfile={out} --platform={platform}".to_string()
}

fn default_bundler_watch() -> Vec<String> {
    vec!["**/*".to_string()]
}

impl Default for BundlerSection {
    fn default() -> Self {
        Self {
            cmd: default_bundler_cmd(),
            watch: default_bundler_watch(),
            exclude: Vec::new(),
        }
    }
}

/// A single build target (`[[compiler]]`).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BuildConfig {
    /// Entry point handed to the bundler.
    pub entry: PathBuf,

    /// Output artifact path, relative to the project root.
    pub out: PathBuf,

    #[serde(default)]
    pub context: Context,

    #[serde(default)]
    pub mode: Mode,

    /// Launch the output with the runtime interpreter after building.
    #[serde(default)]
    pub run: bool,

    /// Set from the selected task, not from the file.
    #[serde(skip)]
    pub watch: bool,

    /// Log the full build output for this configuration.
    #[serde(default)]
    pub verbose: bool,

    /// Explicit rebuild side effect; falls back to the context default.
    #[serde(default)]
    pub on_rebuild: Option<RebuildAction>,
}

impl BuildConfig {
    pub fn new(entry: impl Into<PathBuf>, out: impl Into<PathBuf>) -> Self {
        Self {
            entry: entry.into(),
            out: out.into(),
            context: Context::default(),
            mode: Mode::default(),
            run: false,
            watch: false,
            verbose: false,
            on_rebuild: None,
        }
    }

    pub fn effective_rebuild_action(&self) -> RebuildAction {
        self.on_rebuild
            .unwrap_or_else(|| self.context.default_rebuild_action())
    }

    /// Whether a successful rebuild of this configuration should restart its
    /// runtime: it must be watched, run, and carry `RestartRuntime`.
    pub fn restarts_runtime_on_rebuild(&self) -> bool {
        self.watch
            && self.run
            && self.effective_rebuild_action() == RebuildAction::RestartRuntime
    }
}

/// Parsed timing values from `[config]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timings {
    pub batch_timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            batch_timeout: Duration::from_secs(100),
            poll_interval: Duration::from_millis(250),
        }
    }
}

/// Validated configuration.
///
/// Constructed via `TryFrom<RawConfigFile>`, which runs all semantic checks.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub config: ConfigSection,
    pub bundler: BundlerSection,
    pub compiler: Vec<BuildConfig>,
    timings: Timings,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(
        config: ConfigSection,
        bundler: BundlerSection,
        compiler: Vec<BuildConfig>,
        timings: Timings,
    ) -> Self {
        Self {
            config,
            bundler,
            compiler,
            timings,
        }
    }

    pub fn timings(&self) -> Timings {
        self.timings
    }

    pub fn compilers(&self) -> &[BuildConfig] {
        &self.compiler
    }
}
