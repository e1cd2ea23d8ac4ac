// src/build/invoker.rs

use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use crate::bundler::{BuildOutcome, BuildSettings, Bundler, BundlerError};
use crate::engine::registry::{WatcherId, WatcherRegistry};
use crate::identity::{Signature, SignedConfig};

/// A bundler job bound to one signed configuration.
///
/// Everything produced through a `Compiler` (outcomes, watcher
/// registrations) is tagged with the configuration's [`Signature`].
#[derive(Clone)]
pub struct Compiler {
    bundler: Arc<dyn Bundler>,
    settings: BuildSettings,
    config: SignedConfig,
}

impl fmt::Debug for Compiler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Compiler")
            .field("identity", self.identity())
            .finish_non_exhaustive()
    }
}

impl Compiler {
    pub fn new(bundler: Arc<dyn Bundler>, config: SignedConfig, root: &Path) -> Self {
        let settings = BuildSettings::from_config(&config, root);
        Self {
            bundler,
            settings,
            config,
        }
    }

    pub fn identity(&self) -> &Signature {
        self.config.signature()
    }

    pub fn config(&self) -> &SignedConfig {
        &self.config
    }

    pub fn settings(&self) -> &BuildSettings {
        &self.settings
    }

    /// Execute exactly one build attempt.
    pub async fn run(&self) -> BuildOutcome {
        self.bundler.run(&self.settings).await
    }

    /// Start a watch session and hand its handle to `registry`.
    ///
    /// Each outcome (initial build and every rebuild) is sent on `on_build`.
    pub fn watch(
        &self,
        poll_interval: Duration,
        on_build: mpsc::UnboundedSender<BuildOutcome>,
        registry: &Arc<WatcherRegistry>,
    ) -> Result<WatcherId, BundlerError> {
        let handle = self.bundler.watch(&self.settings, poll_interval, on_build)?;
        Ok(registry.register(self.identity().clone(), handle))
    }
}
