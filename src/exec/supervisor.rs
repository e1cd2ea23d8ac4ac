// src/exec/supervisor.rs

//! Owns launched runtimes, keyed by configuration identity.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::errors::Result;
use crate::identity::{Signature, SignedConfig};

use super::launcher::{LaunchSpec, RuntimeLauncher, RuntimeProcess};

/// Launches runtimes for run-flagged configurations and restarts them on
/// rebuilds.
///
/// At most one runtime exists per identity: a configuration that is already
/// running is restarted rather than launched a second time.
pub struct RuntimeSupervisor {
    launcher: Arc<dyn RuntimeLauncher>,
    root: PathBuf,
    running: Mutex<HashMap<Signature, Box<dyn RuntimeProcess>>>,
}

impl fmt::Debug for RuntimeSupervisor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuntimeSupervisor")
            .field("root", &self.root)
            .finish_non_exhaustive()
    }
}

impl RuntimeSupervisor {
    pub fn new(launcher: Arc<dyn RuntimeLauncher>, root: impl Into<PathBuf>) -> Self {
        Self {
            launcher,
            root: root.into(),
            running: Mutex::new(HashMap::new()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Launch a runtime for every configuration flagged `run`.
    ///
    /// `extra_args` are passed through unchanged to each runtime.
    pub async fn launch_selected(
        &self,
        configs: &[SignedConfig],
        extra_args: &[String],
    ) -> Result<()> {
        let mut running = self.running.lock().await;

        for config in configs.iter().filter(|c| c.run) {
            let identity = config.signature().clone();

            if let Some(process) = running.get_mut(&identity) {
                debug!(compiler = %identity, "runtime already launched; restarting instead");
                process.restart().await?;
                continue;
            }

            let spec = LaunchSpec {
                identity: identity.clone(),
                script: self.root.join(&config.out),
                args: extra_args.to_vec(),
            };
            info!(
                compiler = %identity,
                context = %config.context,
                script = %spec.script.display(),
                "running context"
            );

            let process = self.launcher.launch(&spec)?;
            running.insert(identity, process);
        }

        Ok(())
    }

    /// Restart the runtime launched for `identity`.
    ///
    /// Identities that were never launched (e.g. the first build of a
    /// watch-and-run batch, before launch) are a no-op.
    pub async fn restart(&self, identity: &Signature) -> Result<()> {
        let mut running = self.running.lock().await;
        match running.get_mut(identity) {
            Some(process) => process.restart().await,
            None => {
                debug!(compiler = %identity, "no runtime launched yet; skipping restart");
                Ok(())
            }
        }
    }

    pub async fn launched(&self) -> Vec<Signature> {
        let mut ids: Vec<Signature> = self.running.lock().await.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Stop every launched runtime.
    pub async fn stop_all(&self) {
        let mut running = self.running.lock().await;
        for (identity, mut process) in running.drain() {
            if let Err(err) = process.stop().await {
                warn!(compiler = %identity, error = %err, "failed to stop runtime");
            }
        }
    }
}
