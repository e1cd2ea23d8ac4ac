#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use polypack::config::BuildConfig;
use polypack::engine::{ExitReceiver, Orchestrator, OrchestratorOptions, WatcherRegistry};
use polypack::exec::RuntimeSupervisor;
use polypack::identity::{sign, SignedConfig};
use polypack::types::{Context, Mode, RebuildAction};

use crate::fake_bundler::FakeBundler;
use crate::fake_launcher::FakeLauncher;

/// Builder for `BuildConfig` to simplify test setup.
pub struct BuildConfigBuilder {
    config: BuildConfig,
}

impl BuildConfigBuilder {
    pub fn new(entry: &str, out: &str) -> Self {
        Self {
            config: BuildConfig::new(entry, out),
        }
    }

    pub fn context(mut self, context: Context) -> Self {
        self.config.context = context;
        self
    }

    pub fn mode(mut self, mode: Mode) -> Self {
        self.config.mode = mode;
        self
    }

    pub fn run(mut self, val: bool) -> Self {
        self.config.run = val;
        self
    }

    pub fn watch(mut self, val: bool) -> Self {
        self.config.watch = val;
        self
    }

    pub fn verbose(mut self, val: bool) -> Self {
        self.config.verbose = val;
        self
    }

    pub fn on_rebuild(mut self, action: RebuildAction) -> Self {
        self.config.on_rebuild = Some(action);
        self
    }

    pub fn build(self) -> BuildConfig {
        self.config
    }

    pub fn signed(self) -> SignedConfig {
        sign(self.config)
    }
}

/// Everything a coordinator test needs, wired to fakes.
pub struct Harness {
    pub orchestrator: Orchestrator,
    pub registry: Arc<WatcherRegistry>,
    pub exit_rx: ExitReceiver,
    pub bundler: FakeBundler,
    pub launcher: FakeLauncher,
}

/// Builder for a [`Harness`].
pub struct HarnessBuilder {
    bundler: FakeBundler,
    launcher: FakeLauncher,
    batch_timeout: Duration,
    poll_interval: Duration,
    root: PathBuf,
}

impl HarnessBuilder {
    pub fn new(bundler: FakeBundler) -> Self {
        Self {
            bundler,
            launcher: FakeLauncher::new(),
            batch_timeout: Duration::from_secs(2),
            poll_interval: Duration::from_millis(10),
            root: PathBuf::from("/project"),
        }
    }

    pub fn launcher(mut self, launcher: FakeLauncher) -> Self {
        self.launcher = launcher;
        self
    }

    pub fn batch_timeout(mut self, timeout: Duration) -> Self {
        self.batch_timeout = timeout;
        self
    }

    pub fn root(mut self, root: &str) -> Self {
        self.root = PathBuf::from(root);
        self
    }

    pub fn build(self) -> Harness {
        let (registry, exit_rx) = WatcherRegistry::new();
        let runtimes = Arc::new(RuntimeSupervisor::new(
            Arc::new(self.launcher.clone()),
            self.root.clone(),
        ));
        let options = OrchestratorOptions {
            batch_timeout: self.batch_timeout,
            poll_interval: self.poll_interval,
            root: self.root,
        };
        let orchestrator = Orchestrator::new(
            Arc::new(self.bundler.clone()),
            Arc::clone(&registry),
            runtimes,
            options,
        );

        Harness {
            orchestrator,
            registry,
            exit_rx,
            bundler: self.bundler,
            launcher: self.launcher,
        }
    }
}
